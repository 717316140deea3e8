#![allow(dead_code)]

use resource_sdk::config::{Operation, ResolvedModel, ResolvedResource, Settings};
use resource_sdk::schema::{
    Association, AssociationKind, ColumnDef, ColumnType, FieldValidator, ValidationRule,
};
use resource_sdk::{MemoryTable, Service};
use serde_json::json;
use std::sync::Arc;

fn column(name: &str, kind: ColumnType) -> ColumnDef {
    ColumnDef::new(name, kind)
}

fn association(kind: AssociationKind, target: &str, fk: &str, through: Option<&str>) -> Association {
    Association {
        kind,
        name: target.to_string(),
        target_table: target.to_string(),
        foreign_key: Some(fk.to_string()),
        through: through.map(str::to_string),
    }
}

pub fn authors() -> ResolvedResource {
    ResolvedResource::new("authors", &["id"])
        .columns(vec![
            column("id", ColumnType::Integer).not_null(),
            column("name", ColumnType::String),
            column("email", ColumnType::String),
            column("password", ColumnType::String),
        ])
        .validate(FieldValidator::new("name").require_presence().not_empty())
        .validate(
            FieldValidator::new("email")
                .rule(ValidationRule::named("email", "email").message("must be a valid email")),
        )
        .associate(association(AssociationKind::HasMany, "articles", "author_id", None))
        .hide("password")
}

pub fn articles() -> ResolvedResource {
    let mut status = column("status", ColumnType::String);
    status.default = Some(json!("draft"));
    ResolvedResource::new("articles", &["id"])
        .columns(vec![
            column("id", ColumnType::Integer).not_null(),
            column("author_id", ColumnType::Integer),
            column("title", ColumnType::String).not_null(),
            column("body", ColumnType::Text),
            status,
        ])
        .validate(
            FieldValidator::new("title")
                .require_presence()
                .not_empty()
                .rule(
                    ValidationRule::named("maxLength", "maxLength")
                        .param(json!(20))
                        .message("title is too long")
                        .last(),
                ),
        )
        .validate(FieldValidator::new("status").rule(
            ValidationRule::named("inList", "inList").param(json!(["draft", "published"])),
        ))
        .validate(FieldValidator::new("body").rule(ValidationRule::callable(
            "noShouting",
            |value, _| value.as_str().map_or(true, |s| s != s.to_uppercase()),
        )))
        .associate(association(AssociationKind::BelongsTo, "authors", "author_id", None))
        .associate(association(AssociationKind::BelongsToMany, "tags", "article_id", Some("articles_tags")))
}

pub fn tags() -> ResolvedResource {
    ResolvedResource::new("tags", &["id"])
        .columns(vec![
            column("id", ColumnType::Integer).not_null(),
            column("label", ColumnType::String),
        ])
        .operations(&[Operation::Read])
}

pub fn article_tags() -> ResolvedResource {
    ResolvedResource::new("articles_tags", &["article_id", "tag_id"])
        .path("article-tags")
        .columns(vec![
            column("article_id", ColumnType::Integer).not_null(),
            column("tag_id", ColumnType::Integer).not_null(),
            column("note", ColumnType::Text),
        ])
}

pub fn model() -> ResolvedModel {
    ResolvedModel::new(vec![authors(), articles(), tags(), article_tags()])
}

pub fn seeded_tables() -> Vec<(&'static str, MemoryTable)> {
    vec![
        (
            "authors",
            MemoryTable::new(authors()).with_rows(vec![
                json!({"id": 1, "name": "Ada", "email": "ada@example.com", "password": "secret"}),
                json!({"id": 2, "name": "Linus", "email": "linus@example.com", "password": "hunter2"}),
            ]),
        ),
        (
            "articles",
            MemoryTable::new(articles()).with_rows(vec![
                json!({"id": 1, "author_id": 1, "title": "First", "body": "hello", "status": "published"}),
                json!({"id": 2, "author_id": 1, "title": "Second", "body": "again", "status": "draft"}),
                json!({"id": 3, "author_id": 2, "title": "Third", "body": "other", "status": "published"}),
            ]),
        ),
        (
            "tags",
            MemoryTable::new(tags()).with_rows(vec![json!({"id": 1, "label": "rust"})]),
        ),
        (
            "article-tags",
            MemoryTable::new(article_tags()).with_rows(vec![
                json!({"article_id": 1, "tag_id": 1, "note": "primary"}),
            ]),
        ),
    ]
}

pub fn service_with(settings: Settings) -> Service {
    let mut service = Service::in_memory(model(), settings);
    for (name, table) in seeded_tables() {
        service.register_table(name, Arc::new(table));
    }
    service
}

pub fn service() -> Service {
    service_with(Settings::default())
}
