mod dispatcher;
mod lane;

pub use dispatcher::Dispatcher;
