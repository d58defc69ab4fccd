pub mod delete;
pub mod list;
pub mod lookup;
pub mod register;

pub use delete::delete;
pub use list::list;
pub use lookup::lookup;
pub use register::register;
