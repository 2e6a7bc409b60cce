mod common;
mod creation;
