use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

impl AssociationKind {
    pub const ALL: [AssociationKind; 4] = [
        AssociationKind::BelongsTo,
        AssociationKind::HasOne,
        AssociationKind::HasMany,
        AssociationKind::BelongsToMany,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssociationKind::BelongsTo => "BelongsTo",
            AssociationKind::HasOne => "HasOne",
            AssociationKind::HasMany => "HasMany",
            AssociationKind::BelongsToMany => "BelongsToMany",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Association {
    pub kind: AssociationKind,
    /// Path segment of the related resource.
    pub name: String,
    /// Storage table name of the related resource.
    pub target_table: String,
    pub foreign_key: Option<String>,
    /// Join table for BelongsToMany.
    pub through: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssociationMap {
    items: Vec<Association>,
}

impl AssociationMap {
    pub fn new(items: Vec<Association>) -> Self {
        AssociationMap { items }
    }

    pub fn push(&mut self, association: Association) {
        self.items.push(association);
    }

    /// Associations of one kind, in declaration order.
    pub fn of_kind(&self, kind: AssociationKind) -> impl Iterator<Item = &Association> {
        self.items.iter().filter(move |a| a.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Association> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
