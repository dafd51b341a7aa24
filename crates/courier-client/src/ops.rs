//! A few representative operations built on [`CourierClient::submit`].

use courier_core::{Namespace, RequestDescriptor, TransportOptions};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::{ClientError, client::CourierClient};

/// Flags, tags and date carried as a JSON string alongside a raw message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    pub flags: Option<String>,
    pub tags: Option<String>,
    pub tag_names: Option<String>,
    pub date: Option<Value>,
}

/// Parses message metadata; anything unparseable reads as "no metadata".
pub fn parse_message_meta(meta: Option<&str>) -> MessageMeta {
    meta.and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct GetFolderOptions {
    pub folder_id: Option<String>,
    pub depth: Option<u32>,
    pub view: Option<String>,
    pub visible: bool,
}

impl CourierClient {
    /// Waits for pending notifications; always its own wire call.
    pub async fn noop(
        &self,
        wait: bool,
        limit_to_one_blocked: bool,
        options: Option<TransportOptions>,
    ) -> Result<Value, ClientError> {
        let mut descriptor = RequestDescriptor::new(
            "NoOp",
            json!({
                "wait": u8::from(wait),
                "limitToOneBlocked": u8::from(limit_to_one_blocked),
            }),
        )
        .single();
        descriptor.transport_options = options;
        self.submit(descriptor).await
    }

    pub async fn account_info(&self) -> Result<Value, ClientError> {
        self.submit(
            RequestDescriptor::new("GetInfo", json!({ "sections": "mbox,attrs,zimlets,props" }))
                .namespace(Namespace::Account),
        )
        .await
    }

    pub async fn auto_complete(&self, name: &str) -> Result<Value, ClientError> {
        self.submit(RequestDescriptor::new("AutoComplete", json!({ "name": name })))
            .await
    }

    pub async fn get_folder(&self, options: &GetFolderOptions) -> Result<Value, ClientError> {
        let mut body = Map::new();
        if let Some(folder_id) = &options.folder_id {
            body.insert("folder".to_string(), json!({ "l": folder_id }));
        }
        if let Some(depth) = options.depth {
            body.insert("depth".to_string(), json!(depth));
        }
        if let Some(view) = &options.view {
            body.insert("view".to_string(), json!(view));
        }
        if options.visible {
            body.insert("visible".to_string(), json!(1));
        }

        self.submit(RequestDescriptor::new("GetFolder", Value::Object(body)))
            .await
    }

    /// Authenticates; the reply is sent without the anti-forgery token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Value, ClientError> {
        self.submit(
            RequestDescriptor::new(
                "Auth",
                json!({
                    "account": { "by": "name", "_content": username },
                    "password": password,
                    "persistAuthTokenCookie": true,
                    "csrfTokenSecured": true,
                }),
            )
            .namespace(Namespace::Account)
            .single(),
        )
        .await
    }

    pub async fn logout(&self) -> Result<bool, ClientError> {
        self.submit(
            RequestDescriptor::new("EndSession", json!({ "logoff": true }))
                .namespace(Namespace::Account),
        )
        .await
        .map(|_| true)
    }

    /// Uploads a raw message into a folder.
    pub async fn add_message(
        &self,
        folder_id: &str,
        content: &str,
        meta: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.submit(add_message_descriptor(folder_id, content, meta))
            .await
    }
}

fn add_message_descriptor(folder_id: &str, content: &str, meta: Option<&str>) -> RequestDescriptor {
    let meta = parse_message_meta(meta);

    let mut message = Map::new();
    message.insert("l".to_string(), json!(folder_id));
    message.insert("content".to_string(), json!({ "_content": content }));
    if let Some(flags) = meta.flags {
        message.insert("f".to_string(), json!(flags));
    }
    if let Some(tags) = meta.tags {
        message.insert("t".to_string(), json!(tags));
    }
    if let Some(tag_names) = meta.tag_names {
        message.insert("tn".to_string(), json!(tag_names));
    }
    if let Some(date) = meta.date {
        message.insert("d".to_string(), date);
    }

    RequestDescriptor::new("AddMsg", json!({ "m": message })).single()
}
