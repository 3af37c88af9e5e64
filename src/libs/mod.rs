pub mod io;
pub mod oo;
pub mod psl;
