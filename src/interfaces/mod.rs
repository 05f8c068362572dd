pub mod iceout;
pub mod telegram;
