//! GraphQL schema
//!
//! Unknown and malformed note IDs are not errors, they result in an empty list, `null` or
//! `false` depending on the field.

use async_graphql::Context;
use async_graphql::EmptySubscription;
use async_graphql::ID;
use async_graphql::InputValueError;
use async_graphql::InputValueResult;
use async_graphql::Object;
use async_graphql::Scalar;
use async_graphql::ScalarType;
use async_graphql::Schema;
use async_graphql::Value;
use axum::http::header::SET_COOKIE;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::database;
use crate::database::CreateNoteValues;
use crate::database::DatabaseConfig;
use crate::database::UpdateNoteValues;
use crate::database::format_timestamp;
use crate::database::notes;
use crate::database::open_transaction;
use crate::database::optional;
use crate::database::parse_timestamp;
use crate::notes::Note;

use super::session::SessionKey;
use super::session::authenticate;
use super::session::removal_cookie;

/// The complete Hej schema
pub type NotesSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema, the database and session key are shared by every request
pub fn build_schema(database: DatabaseConfig, session_key: SessionKey) -> NotesSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(database)
        .data(session_key)
        .finish()
}

/// Timestamp in UTC, formatted as `2021-05-14T13:19:04Z`
pub struct DateTime(pub NaiveDateTime);

#[Scalar]
impl ScalarType for DateTime {
    fn parse(value: Value) -> InputValueResult<Self> {
        match &value {
            Value::String(timestamp) => parse_timestamp(timestamp)
                .map(DateTime)
                .map_err(InputValueError::custom),
            _ => Err(InputValueError::expected_type(value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(format_timestamp(&self.0))
    }
}

/// GraphQL version of a note
pub struct NoteObject(Note);

#[Object(name = "Note")]
impl NoteObject {
    async fn uuid(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn text(&self) -> &str {
        &self.0.text
    }

    async fn favorite(&self) -> bool {
        self.0.favorite
    }

    async fn creation_date(&self) -> DateTime {
        DateTime(self.0.creation_date)
    }

    async fn last_changed(&self) -> DateTime {
        DateTime(self.0.last_changed)
    }
}

fn database_config<'c>(ctx: &Context<'c>) -> async_graphql::Result<&'c DatabaseConfig> {
    ctx.data::<DatabaseConfig>()
}

/// Log the details, the client only learns that something went wrong
fn storage_error(err: database::Error) -> async_graphql::Error {
    tracing::error!("Storage error: {err}");

    async_graphql::Error::new("Internal server error")
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// All notes, or the single note with the given UUID
    async fn notes(
        &self,
        ctx: &Context<'_>,
        uuid: Option<String>,
    ) -> async_graphql::Result<Vec<NoteObject>> {
        authenticate(ctx)?;
        let config = database_config(ctx)?;

        let notes: Vec<Note> = match uuid {
            Some(uuid) => {
                let Ok(id) = Uuid::parse_str(&uuid) else {
                    return Ok(Vec::new());
                };

                open_transaction(config, move |transaction| {
                    Box::pin(async move { optional(notes::select_one(transaction, &id).await) })
                })
                .await
                .map_err(storage_error)?
                .into_iter()
                .collect()
            }
            None => open_transaction(config, |transaction| {
                Box::pin(async move { notes::select_all(transaction).await })
            })
            .await
            .map_err(storage_error)?,
        };

        Ok(notes.into_iter().map(NoteObject).collect())
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Check the password, returns it when it is the session key
    async fn login(
        &self,
        ctx: &Context<'_>,
        password: String,
    ) -> async_graphql::Result<Option<String>> {
        let key = ctx.data::<SessionKey>()?;

        if key.matches(&password) {
            Ok(Some(password))
        } else {
            tracing::info!("Login with wrong password");

            Ok(None)
        }
    }

    /// Forget the session key
    async fn logout(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        authenticate(ctx)?;

        ctx.append_http_header(SET_COOKIE, removal_cookie());

        Ok(true)
    }

    async fn create_note(
        &self,
        ctx: &Context<'_>,
        title: String,
        text: Option<String>,
    ) -> async_graphql::Result<NoteObject> {
        authenticate(ctx)?;
        let config = database_config(ctx)?;

        let note = open_transaction(config, move |transaction| {
            Box::pin(async move {
                let values = CreateNoteValues {
                    title: &title,
                    text: text.as_deref().unwrap_or_default(),
                };

                notes::insert(transaction, &values).await
            })
        })
        .await
        .map_err(storage_error)?;

        Ok(NoteObject(note))
    }

    /// Change a note, omitted fields keep their value
    async fn update_note(
        &self,
        ctx: &Context<'_>,
        uuid: String,
        title: Option<String>,
        text: Option<String>,
        favorite: Option<bool>,
    ) -> async_graphql::Result<Option<NoteObject>> {
        authenticate(ctx)?;
        let config = database_config(ctx)?;

        let Ok(id) = Uuid::parse_str(&uuid) else {
            return Ok(None);
        };

        let note = open_transaction(config, move |transaction| {
            Box::pin(async move {
                let values = UpdateNoteValues {
                    title: title.as_deref(),
                    text: text.as_deref(),
                    favorite,
                };

                optional(notes::update(transaction, &id, &values).await)
            })
        })
        .await
        .map_err(storage_error)?;

        Ok(note.map(NoteObject))
    }

    async fn mark_note_as_favorite(
        &self,
        ctx: &Context<'_>,
        uuid: String,
        favorite: bool,
    ) -> async_graphql::Result<Option<NoteObject>> {
        authenticate(ctx)?;
        let config = database_config(ctx)?;

        let Ok(id) = Uuid::parse_str(&uuid) else {
            return Ok(None);
        };

        let note = open_transaction(config, move |transaction| {
            Box::pin(async move {
                optional(notes::mark_favorite(transaction, &id, favorite).await)
            })
        })
        .await
        .map_err(storage_error)?;

        Ok(note.map(NoteObject))
    }

    /// Remove a note, `false` when there was nothing to remove
    async fn delete_note(&self, ctx: &Context<'_>, uuid: String) -> async_graphql::Result<bool> {
        authenticate(ctx)?;
        let config = database_config(ctx)?;

        let Ok(id) = Uuid::parse_str(&uuid) else {
            return Ok(false);
        };

        let deleted = open_transaction(config, move |transaction| {
            Box::pin(async move { optional(notes::delete(transaction, &id).await) })
        })
        .await
        .map_err(storage_error)?;

        Ok(deleted.is_some())
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::Request;
    use async_graphql::Variables;
    use serde_json::Value as Json;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::api::session::SessionCookie;

    use super::*;

    struct TestSchema {
        schema: NotesSchema,
        _directory: TempDir,
    }

    impl TestSchema {
        fn new() -> Self {
            let directory = TempDir::new().unwrap();
            let config = DatabaseConfig::file(directory.path().join("hej.sqlite"));

            Self {
                schema: build_schema(config, SessionKey::new("verysecret")),
                _directory: directory,
            }
        }

        async fn execute_with_cookie(
            &self,
            query: &str,
            variables: Json,
            cookie: Option<&str>,
        ) -> async_graphql::Response {
            let request = Request::new(query)
                .variables(Variables::from_json(variables))
                .data(SessionCookie(cookie.map(ToString::to_string)));

            self.schema.execute(request).await
        }

        /// Execute as a logged in client, errors fail the test
        async fn execute(&self, query: &str, variables: Json) -> Json {
            let response = self
                .execute_with_cookie(query, variables, Some("verysecret"))
                .await;

            assert!(response.errors.is_empty(), "{:?}", response.errors);

            response.data.into_json().unwrap()
        }

        async fn create(&self, title: &str, text: &str) -> String {
            let data = self
                .execute(
                    "mutation ($title: String!, $text: String) { \
                        createNote(title: $title, text: $text) { uuid } }",
                    json!({ "title": title, "text": text }),
                )
                .await;

            data["createNote"]["uuid"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_schema_shape() {
        let schema = TestSchema::new();
        let sdl = schema.schema.sdl();

        assert!(sdl.contains("scalar DateTime"));
        assert!(sdl.contains("type Note {"));
        assert!(sdl.contains("notes(uuid: String): [Note!]!"));
        assert!(sdl.contains("markNoteAsFavorite(uuid: String!, favorite: Boolean!): Note"));
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let schema = TestSchema::new();

        let data = schema
            .execute(
                "mutation { createNote(title: \"Groceries\") { uuid title text favorite creationDate lastChanged } }",
                json!({}),
            )
            .await;

        let note = &data["createNote"];
        assert_eq!("Groceries", note["title"]);
        assert_eq!("", note["text"]);
        assert_eq!(false, note["favorite"]);
        assert_eq!(note["creationDate"], note["lastChanged"]);
        assert!(note["creationDate"].as_str().unwrap().ends_with('Z'));

        let data = schema.execute("{ notes { uuid title } }", json!({})).await;
        assert_eq!(1, data["notes"].as_array().unwrap().len());
        assert_eq!(note["uuid"], data["notes"][0]["uuid"]);
    }

    #[tokio::test]
    async fn test_single_note() {
        let schema = TestSchema::new();
        let id = schema.create("First", "One").await;
        schema.create("Second", "Two").await;

        let query = "query ($uuid: String) { notes(uuid: $uuid) { uuid text } }";

        let data = schema.execute(query, json!({ "uuid": id })).await;
        assert_eq!(json!([{ "uuid": id, "text": "One" }]), data["notes"]);

        let data = schema
            .execute(query, json!({ "uuid": Uuid::new_v4().to_string() }))
            .await;
        assert_eq!(json!([]), data["notes"]);

        let data = schema.execute(query, json!({ "uuid": "not-a-uuid" })).await;
        assert_eq!(json!([]), data["notes"]);
    }

    #[tokio::test]
    async fn test_update_note() {
        let schema = TestSchema::new();
        let id = schema.create("Title", "Text").await;

        let query = "mutation ($uuid: String!, $title: String, $favorite: Boolean) { \
            updateNote(uuid: $uuid, title: $title, favorite: $favorite) { title text favorite } }";

        let data = schema
            .execute(query, json!({ "uuid": id, "title": "Renamed" }))
            .await;
        assert_eq!(
            json!({ "title": "Renamed", "text": "Text", "favorite": false }),
            data["updateNote"]
        );

        let data = schema
            .execute(query, json!({ "uuid": id, "favorite": true }))
            .await;
        assert_eq!(true, data["updateNote"]["favorite"]);

        let data = schema
            .execute(query, json!({ "uuid": Uuid::new_v4().to_string(), "title": "Other" }))
            .await;
        assert_eq!(Json::Null, data["updateNote"]);

        let data = schema.execute(query, json!({ "uuid": "nope" })).await;
        assert_eq!(Json::Null, data["updateNote"]);
    }

    #[tokio::test]
    async fn test_mark_note_as_favorite() {
        let schema = TestSchema::new();
        let id = schema.create("Title", "Text").await;

        let query = "mutation ($uuid: String!, $favorite: Boolean!) { \
            markNoteAsFavorite(uuid: $uuid, favorite: $favorite) { favorite } }";

        let data = schema
            .execute(query, json!({ "uuid": id, "favorite": true }))
            .await;
        assert_eq!(true, data["markNoteAsFavorite"]["favorite"]);

        let data = schema
            .execute(
                query,
                json!({ "uuid": Uuid::new_v4().to_string(), "favorite": true }),
            )
            .await;
        assert_eq!(Json::Null, data["markNoteAsFavorite"]);
    }

    #[tokio::test]
    async fn test_delete_note() {
        let schema = TestSchema::new();
        let id = schema.create("Title", "Text").await;
        let sibling = schema.create("Sibling", "Text").await;

        let query = "mutation ($uuid: String!) { deleteNote(uuid: $uuid) }";

        let data = schema.execute(query, json!({ "uuid": id })).await;
        assert_eq!(true, data["deleteNote"]);

        let data = schema.execute(query, json!({ "uuid": id })).await;
        assert_eq!(false, data["deleteNote"]);

        let data = schema.execute(query, json!({ "uuid": "nope" })).await;
        assert_eq!(false, data["deleteNote"]);

        let data = schema.execute("{ notes { uuid } }", json!({})).await;
        assert_eq!(json!([{ "uuid": sibling }]), data["notes"]);
    }

    #[tokio::test]
    async fn test_login() {
        let schema = TestSchema::new();
        let query = "mutation ($password: String!) { login(password: $password) }";

        let response = schema
            .execute_with_cookie(query, json!({ "password": "verysecret" }), None)
            .await;
        assert!(response.errors.is_empty());
        assert_eq!(
            json!({ "login": "verysecret" }),
            response.data.into_json().unwrap()
        );

        let response = schema
            .execute_with_cookie(query, json!({ "password": "guess" }), None)
            .await;
        assert_eq!(json!({ "login": null }), response.data.into_json().unwrap());
    }

    #[tokio::test]
    async fn test_logout_removes_cookie() {
        let schema = TestSchema::new();

        let response = schema
            .execute_with_cookie("mutation { logout }", json!({}), Some("verysecret"))
            .await;

        assert!(response.errors.is_empty());
        let cookie = response.http_headers.get(SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("HejSessionKey=;"));
    }

    #[tokio::test]
    async fn test_authentication_required() {
        let schema = TestSchema::new();

        for (cookie, message) in [
            (None, "authentication cookie 'HejSessionKey' not set"),
            (Some("guess"), "wrong session key"),
        ] {
            let response = schema
                .execute_with_cookie("{ notes { uuid } }", json!({}), cookie)
                .await;

            assert_eq!(1, response.errors.len());
            let error = &response.errors[0];
            assert_eq!(message, error.message);

            let extensions = serde_json::to_value(&error.extensions).unwrap();
            assert_eq!("UNAUTHENTICATED", extensions["code"]);
        }
    }
}
