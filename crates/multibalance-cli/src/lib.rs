pub mod balance;
pub mod util;
