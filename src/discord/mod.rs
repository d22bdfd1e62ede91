mod bot;
mod commands;
mod components;
mod embeds;

pub use bot::{Context, Data, create_framework};
