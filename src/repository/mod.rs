pub mod address_mapping_repository;

pub use address_mapping_repository::{
    AddressMappingRepository, InMemoryAddressMappingRepository, PgAddressMappingRepository,
};
