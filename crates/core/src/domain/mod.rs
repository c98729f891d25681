pub mod budget;
pub mod sales;
