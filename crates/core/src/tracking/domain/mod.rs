pub mod fish_tracker;
pub mod track;
