mod common;

mod catalog;
mod moderation;
