mod config;
mod context;
mod time;
