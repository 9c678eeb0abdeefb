pub mod classify;
pub mod countdown;
pub mod poll;
pub mod tracker;
