//! Data model and pure transformations for the order enrichment processor.
//!
//! This crate provides:
//! - The wire records: [`OrderEvent`], [`ProductRecord`], [`CustomerRecord`]
//! - The derived documents: [`ItemEnrichedEvent`], [`OrderAccumulator`],
//!   [`EnrichedOrder`]
//! - The pure item join ([`join_item`]) and the accumulator reducer
//!   ([`OrderAccumulator::apply`]), both free of I/O so the state
//!   transitions are testable in isolation

pub mod enrich;
pub mod error;
pub mod records;

pub use enrich::{EnrichedOrder, ItemEnrichedEvent, OrderAccumulator, OrderInfo, ProductLine, join_item};
pub use error::{DomainError, Result, decode};
pub use records::{CustomerRecord, LineItem, OrderEvent, ProductRecord, ReferenceRecord};
