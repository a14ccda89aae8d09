use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::api::ApiClient;
use crate::store::NoteStore;
use crate::tools::{CreateNote, EditNote, SearchNotes, SetNotePrivacy, Tool};

const SERVER_NAME: &str = "inkpost";
const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Protocol-level failure, sent back as a JSON-RPC error object. Tool
/// failures never take this path; they are reported in-band as `isError`
/// text results.
#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("unknown method: {}", method),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC 2.0 server speaking the tool protocol over stdin/stdout.
/// One request per line in, one response per line out.
pub struct ToolServer {
    api: ApiClient,
    store: NoteStore,
}

impl ToolServer {
    pub fn new(api: ApiClient, store: NoteStore) -> Self {
        Self { api, store }
    }

    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await.context("reading stdin")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("skipping malformed request: {}", e);
                    continue;
                }
            };

            // Notifications carry no id and get no reply.
            let Some(id) = request.id.clone() else {
                log::debug!("notification: {}", request.method);
                continue;
            };

            let reply = match self.dispatch(&request).await {
                Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Err(e) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": e.code, "message": e.message },
                }),
            };

            let mut out = serde_json::to_vec(&reply)?;
            out.push(b'\n');
            stdout.write_all(&out).await?;
            stdout.flush().await?;
        }

        Ok(())
    }

    async fn dispatch(&self, request: &JsonRpcRequest) -> Result<Value, RpcError> {
        log::debug!("request: {}", request.method);
        match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(&request.params).await,
            other => Err(RpcError::method_not_found(other)),
        }
    }

    async fn call_tool(&self, params: &Value) -> Result<Value, RpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call params missing tool name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let outcome = self.run_tool(name, arguments).await;
        let (text, is_error) = match outcome {
            Ok(text) => (text, false),
            Err(e) => (format!("❌ {}", e), true),
        };

        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        }))
    }

    async fn run_tool(&self, name: &str, arguments: Value) -> Result<String> {
        match name {
            "create_note" => execute(CreateNote::new(&self.api, &self.store), arguments).await,
            "edit_note" => execute(EditNote::new(&self.api), arguments).await,
            "set_note_privacy" => execute(SetNotePrivacy::new(&self.api), arguments).await,
            "search_notes" => execute(SearchNotes::new(&self.store), arguments).await,
            other => anyhow::bail!("unknown tool: {}", other),
        }
    }
}

/// Parse the arguments into the tool's input type and run it.
async fn execute<T>(tool: T, arguments: Value) -> Result<String>
where
    T: Tool<Output = String>,
    T::Input: serde::de::DeserializeOwned,
{
    let input: T::Input = serde_json::from_value(arguments)
        .map_err(|e| anyhow::anyhow!("invalid arguments: {}", e))?;
    log::debug!("running tool {}", tool.name());
    tool.run(input).await
}

fn tool_definitions() -> Vec<Value> {
    let paragraphs_schema = json!({
        "type": "array",
        "description": "Blocks of the note, rendered in order. A block is a \
            text paragraph (default), a quote, a note reference, or a file.",
        "items": {
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["text", "quote", "note", "file"],
                    "description": "Block kind; defaults to text"
                },
                "texts": {
                    "type": "array",
                    "description": "Rich text spans for paragraph and quote blocks",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": { "type": "string" },
                            "bold": { "type": "boolean" },
                            "highlight": { "type": "boolean" },
                            "link": { "type": "string", "description": "http(s) URL" }
                        },
                        "required": ["text"]
                    }
                },
                "note_id": {
                    "type": "string",
                    "description": "Referenced note id, for note blocks"
                },
                "file_type": {
                    "type": "string",
                    "enum": ["image", "audio", "pdf"],
                    "description": "Media kind, for file blocks"
                },
                "source_type": {
                    "type": "string",
                    "enum": ["local", "url"],
                    "description": "Where the file comes from, for file blocks"
                },
                "source_path": {
                    "type": "string",
                    "description": "Local path or URL of the file"
                },
                "metadata": {
                    "type": "object",
                    "description": "Extra display attributes such as alt or show_note"
                }
            }
        }
    });

    vec![
        json!({
            "name": "create_note",
            "description": "Create a note from paragraphs of rich text, quotes, \
                note references and media files. Media is uploaded or relayed \
                as part of the call.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "paragraphs": paragraphs_schema.clone(),
                    "auto_publish": {
                        "type": "boolean",
                        "description": "Publish immediately instead of saving a draft"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Tags to attach to the note"
                    }
                },
                "required": ["paragraphs"]
            }
        }),
        json!({
            "name": "edit_note",
            "description": "Replace the entire content of an existing note.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "note_id": { "type": "string", "description": "Id of the note to edit" },
                    "paragraphs": paragraphs_schema
                },
                "required": ["note_id", "paragraphs"]
            }
        }),
        json!({
            "name": "set_note_privacy",
            "description": "Set a note's visibility: public, private, or public \
                under a rule with optional no-share and expiry.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "note_id": { "type": "string", "description": "Id of the note" },
                    "privacy_type": {
                        "type": "string",
                        "enum": ["public", "private", "rule"]
                    },
                    "no_share": {
                        "type": "boolean",
                        "description": "Block sharing when privacy_type is rule"
                    },
                    "expire_at": {
                        "type": "integer",
                        "description": "Unix timestamp when the rule expires; 0 for never"
                    }
                },
                "required": ["note_id", "privacy_type"]
            }
        }),
        json!({
            "name": "search_notes",
            "description": "Search locally recorded notes by creation time.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query_type": {
                        "type": "string",
                        "enum": [
                            "today", "yesterday", "specific_date", "date_range",
                            "this_week", "last_week", "this_month", "last_month"
                        ],
                        "description": "Time window; defaults to today"
                    },
                    "specific_date": {
                        "type": "string",
                        "description": "YYYY-MM-DD, for specific_date queries"
                    },
                    "start_date": {
                        "type": "string",
                        "description": "YYYY-MM-DD, for date_range queries"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "YYYY-MM-DD, for date_range queries"
                    }
                }
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_server() -> ToolServer {
        let api = ApiClient::new(
            "https://open.example-notes.com".to_string(),
            "test-key".to_string(),
        );
        let store = NoteStore::in_memory().await.unwrap();
        ToolServer::new(api, store)
    }

    #[test]
    fn test_tool_definitions_cover_all_tools() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["create_note", "edit_note", "set_note_privacy", "search_notes"]
        );
        for def in &defs {
            assert_eq!(def["inputSchema"]["type"], "object");
        }
    }

    #[test]
    fn test_request_parsing() {
        let req: JsonRpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
        )
        .unwrap();
        assert_eq!(req.method, "tools/list");
        assert_eq!(req.id, Some(json!(1)));
        assert!(req.params.is_null());
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let server = test_server().await;
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"id":1,"method":"initialize"}"#).unwrap();
        let result = server.dispatch(&req).await.unwrap();
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        let server = test_server().await;
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"id":1,"method":"resources/list"}"#).unwrap();
        let err = server.dispatch(&req).await.unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_without_tool_name_is_invalid_params() {
        let server = test_server().await;
        let req: JsonRpcRequest = serde_json::from_str(
            r#"{"id":1,"method":"tools/call","params":{"arguments":{}}}"#,
        )
        .unwrap();
        let err = server.dispatch(&req).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("tool name"));
    }

    #[tokio::test]
    async fn test_tool_names_match_dispatch() {
        let server = test_server().await;
        assert_eq!(CreateNote::new(&server.api, &server.store).name(), "create_note");
        assert_eq!(EditNote::new(&server.api).name(), "edit_note");
        assert_eq!(SetNotePrivacy::new(&server.api).name(), "set_note_privacy");
        assert_eq!(SearchNotes::new(&server.store).name(), "search_notes");
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_in_band_error() {
        let server = test_server().await;
        let params = json!({ "name": "delete_everything", "arguments": {} });
        let result = server.call_tool(&params).await.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_bad_arguments_report_in_band_error() {
        let server = test_server().await;
        let params = json!({
            "name": "edit_note",
            "arguments": { "paragraphs": [] }
        });
        let result = server.call_tool(&params).await.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_search_notes_runs_against_empty_store() {
        let server = test_server().await;
        let params = json!({
            "name": "search_notes",
            "arguments": { "query_type": "today" }
        });
        let result = server.call_tool(&params).await.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("No notes found"));
    }
}
