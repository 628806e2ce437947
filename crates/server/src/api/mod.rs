mod handlers;
mod middleware;
mod routes;
mod tasks;

pub use routes::create_router;
