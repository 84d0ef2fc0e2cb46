pub mod check;
pub mod label;
pub mod list;
pub mod track;
