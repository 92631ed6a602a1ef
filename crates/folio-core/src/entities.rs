//! `OrderedEntity` implementations for the dashboard collections.

use folio_api::{Certificate, CollectionKind, Education, Experience, RowId, Skill};

use crate::traits::OrderedEntity;

macro_rules! ordered_entity {
    ($ty:ty, $kind:expr, $tracks_updated_at:expr) => {
        impl OrderedEntity for $ty {
            const COLLECTION: CollectionKind = $kind;
            const TRACKS_UPDATED_AT: bool = $tracks_updated_at;

            fn id(&self) -> RowId {
                self.id
            }

            fn position(&self) -> i64 {
                self.position
            }

            fn set_position(&mut self, position: i64) {
                self.position = position;
            }
        }
    };
}

ordered_entity!(Skill, CollectionKind::Skills, false);
ordered_entity!(Experience, CollectionKind::Experiences, true);
ordered_entity!(Education, CollectionKind::Education, true);
ordered_entity!(Certificate, CollectionKind::Certificates, true);
