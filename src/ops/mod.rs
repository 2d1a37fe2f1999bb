pub mod category_view;
pub mod collection;
pub mod editor;
pub mod reorder;
pub mod transaction;
