mod artifact;
mod hereditary_stratigraphic_column;
mod ordered_store;
mod stratum;

pub use artifact::HereditaryStratigraphicArtifact;
pub use hereditary_stratigraphic_column::{ColumnConfig, HereditaryStratigraphicColumn};
pub use ordered_store::{MapStore, OrderedStore, StoreKind, VectorStore};
pub use stratum::{Annotation, Stratum};
