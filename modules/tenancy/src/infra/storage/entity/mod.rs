pub mod tenant;
pub mod tenant_group;
