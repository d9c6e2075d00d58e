pub mod changelog;
pub mod dto;
pub mod routes;
pub mod viewsets;
