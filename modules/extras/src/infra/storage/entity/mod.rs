pub mod custom_field;
pub mod export_template;
pub mod object_change;
pub mod tag;
pub mod tagged_item;
