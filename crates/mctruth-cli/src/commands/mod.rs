pub mod inspect;
pub mod realign;
