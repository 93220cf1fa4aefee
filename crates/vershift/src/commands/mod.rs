//! Command implementations

pub mod check;

pub mod compare;

pub mod info;
