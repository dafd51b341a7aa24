//! SOAP-over-JSON request bodies and response decoding.

use courier_core::{
    BatchEnvelope, ChangeRecord, Fault, NotificationDelta, RawResponse, RefreshSnapshot,
    RequestContext, RequestDescriptor, ResponseHeader, ResponseItem, Sequence, SessionId,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::TransportError;

/// Namespace of the header context and the batch wrapper.
pub const ZIMBRA_URN: &str = "urn:zimbra";
/// Wire name of the batch wrapper request.
pub const BATCH_REQUEST: &str = "BatchRequest";

const BATCH_RESPONSE: &str = "BatchResponse";
const FAULT: &str = "Fault";
const REQUEST_ID: &str = "requestId";
const JSNS: &str = "_jsns";

/// Serializes a value to JSON bytes for wire transmission.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(value).map_err(|err| TransportError::Encode(err.to_string()))
}

/// Deserializes a JSON payload into a typed value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(bytes).map_err(|err| TransportError::Decode(err.to_string()))
}

/// Wire element name for an operation, e.g. `GetFolder` -> `GetFolderRequest`.
pub fn request_name(operation: &str) -> String {
    format!("{operation}Request")
}

/// Builds the body for one envelope; each item's position is its `requestId`.
pub fn batch_body(envelope: &BatchEnvelope, context: &RequestContext) -> Value {
    let mut batch = Map::new();
    batch.insert(JSNS.to_string(), json!(ZIMBRA_URN));
    batch.insert("onerror".to_string(), json!("continue"));

    for (index, descriptor) in envelope.iter().enumerate() {
        let mut item = request_object(descriptor);
        item.insert(REQUEST_ID.to_string(), json!(index.to_string()));

        let slot = batch
            .entry(request_name(&descriptor.name))
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = slot {
            items.push(Value::Object(item));
        }
    }

    json!({
        "Header": { "context": header_context(context) },
        "Body": { BATCH_REQUEST: batch },
    })
}

/// Builds the body for a dedicated single call.
pub fn single_body(descriptor: &RequestDescriptor, context: &RequestContext) -> Value {
    let mut body = Map::new();
    body.insert(
        request_name(&descriptor.name),
        Value::Object(request_object(descriptor)),
    );

    json!({
        "Header": { "context": header_context(context) },
        "Body": body,
    })
}

fn request_object(descriptor: &RequestDescriptor) -> Map<String, Value> {
    let mut object = match &descriptor.body {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    object.insert(JSNS.to_string(), json!(descriptor.namespace.urn()));
    object
}

fn header_context(context: &RequestContext) -> Value {
    let mut header = Map::new();
    header.insert(JSNS.to_string(), json!(ZIMBRA_URN));

    if let Some(token) = &context.jwt_token {
        header.insert("jwtToken".to_string(), json!(token));
    }
    if let Some(token) = &context.csrf_token {
        header.insert("csrfToken".to_string(), json!(token));
    }
    if let Some(session_id) = &context.session_id {
        header.insert("session".to_string(), json!({ "id": session_id.0 }));
    }
    if let Some(sequence) = context.sequence {
        header.insert("notify".to_string(), json!({ "seq": sequence.0 }));
    }
    if let Some(user_agent) = &context.user_agent {
        header.insert("userAgent".to_string(), json!(user_agent));
    }
    if let Some(account) = &context.account {
        header.insert(
            "account".to_string(),
            json!({ "by": "name", "_content": account }),
        );
    }

    Value::Object(header)
}

/// Decodes a batch response for an envelope of `len` requests.
///
/// A top-level fault in place of the batch wrapper applies to every item.
pub fn decode_batch(document: &Value, len: usize) -> Result<RawResponse, TransportError> {
    let header = decode_header(document);
    let body = document
        .get("Body")
        .ok_or_else(|| TransportError::Decode("response has no Body".to_string()))?;

    if let Some(Value::Object(batch)) = body.get(BATCH_RESPONSE) {
        let mut items = Vec::new();
        for (name, entries) in batch {
            if name == JSNS {
                continue;
            }
            for entry in as_entries(entries) {
                let Some(index) = entry.get(REQUEST_ID).and_then(request_index) else {
                    tracing::warn!(element = %name, "batch item without usable requestId");
                    continue;
                };
                if name == FAULT {
                    items.push(ResponseItem::fault(index, parse_fault(entry)));
                } else {
                    items.push(ResponseItem::body(index, strip_envelope_fields(entry)));
                }
            }
        }
        return Ok(RawResponse { header, items });
    }

    if let Some(fault) = body.get(FAULT) {
        let fault = parse_fault(fault);
        let items = (0..len)
            .map(|index| ResponseItem::fault(index, fault.clone()))
            .collect();
        return Ok(RawResponse { header, items });
    }

    Err(TransportError::Decode(
        "response Body has neither BatchResponse nor Fault".to_string(),
    ))
}

/// Decodes the response to a dedicated single call.
pub fn decode_single(document: &Value) -> Result<RawResponse, TransportError> {
    let header = decode_header(document);
    let Some(Value::Object(body)) = document.get("Body") else {
        return Err(TransportError::Decode("response has no Body".to_string()));
    };

    let items = if let Some(fault) = body.get(FAULT) {
        vec![ResponseItem::fault(0, parse_fault(fault))]
    } else {
        body.iter()
            .find(|(name, _)| name.ends_with("Response"))
            .map(|(_, entry)| vec![ResponseItem::body(0, strip_envelope_fields(entry))])
            .unwrap_or_default()
    };

    Ok(RawResponse { header, items })
}

/// Extracts session and notification metadata from `Header.context`.
pub fn decode_header(document: &Value) -> ResponseHeader {
    let Some(context) = document.pointer("/Header/context") else {
        return ResponseHeader::default();
    };

    let session_id = context.get("session").and_then(session_id_of);
    let notify = context
        .get("notify")
        .and_then(|notify| match notify {
            Value::Array(entries) => entries.first(),
            other => Some(other),
        })
        .and_then(parse_delta);
    let refresh = context.get("refresh").map(|state| RefreshSnapshot {
        sequence: sequence_of(state.get("seq"))
            .map(Sequence)
            .or_else(|| notify.as_ref().map(|delta| delta.sequence))
            .unwrap_or(Sequence(0)),
        state: state.clone(),
    });

    ResponseHeader {
        session_id,
        notify,
        refresh,
    }
}

fn session_id_of(value: &Value) -> Option<SessionId> {
    match value {
        Value::String(id) if !id.is_empty() => Some(SessionId(id.clone())),
        Value::Number(id) => Some(SessionId(id.to_string())),
        Value::Object(session) => session
            .get("id")
            .or_else(|| session.get("_content"))
            .and_then(session_id_of),
        Value::Array(sessions) => sessions.first().and_then(session_id_of),
        _ => None,
    }
}

fn parse_delta(value: &Value) -> Option<NotificationDelta> {
    let Some(sequence) = sequence_of(value.get("seq")) else {
        tracing::warn!("notification without sequence number ignored");
        return None;
    };

    let mut changes = Vec::new();
    for (section, created) in [("created", true), ("modified", false)] {
        let Some(Value::Object(kinds)) = value.get(section) else {
            continue;
        };
        for (kind, objects) in kinds {
            if kind.starts_with('_') {
                continue;
            }
            for object in as_entries(objects) {
                let kind = kind.clone();
                let object = object.clone();
                changes.push(if created {
                    ChangeRecord::Created { kind, object }
                } else {
                    ChangeRecord::Modified { kind, object }
                });
            }
        }
    }

    if let Some(ids) = value.pointer("/deleted/id").and_then(Value::as_str) {
        let ids: Vec<String> = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if !ids.is_empty() {
            changes.push(ChangeRecord::Deleted { ids });
        }
    }

    Some(NotificationDelta {
        sequence: Sequence(sequence),
        changes,
    })
}

fn parse_fault(value: &Value) -> Fault {
    let message = value
        .pointer("/Reason/Text")
        .and_then(Value::as_str)
        .unwrap_or("unknown server fault");
    let code = value
        .pointer("/Detail/Error/Code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let detail = value
        .pointer("/Detail/Error/Trace")
        .and_then(Value::as_str)
        .map(str::to_string);

    Fault {
        code,
        message: message.to_string(),
        detail,
    }
}

fn sequence_of(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn request_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(entries) => entries.iter().collect(),
        other => vec![other],
    }
}

fn strip_envelope_fields(entry: &Value) -> Value {
    match entry {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove(REQUEST_ID);
            map.remove(JSNS);
            Value::Object(map)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use courier_core::{
        BatchEnvelope, ChangeRecord, Namespace, RequestContext, RequestDescriptor, Sequence,
        SessionId,
    };
    use serde_json::json;

    use super::{batch_body, decode_batch, decode_header, decode_single, single_body};

    #[test]
    fn batch_body_tags_items_with_position() {
        let envelope = BatchEnvelope::new(vec![
            RequestDescriptor::new("GetFolder", json!({"depth": 1})),
            RequestDescriptor::new("GetInfo", json!({})).namespace(Namespace::Account),
            RequestDescriptor::new("GetFolder", json!({"depth": 2})),
        ]);
        let context = RequestContext {
            session_id: Some(SessionId::from("s-1")),
            sequence: Some(Sequence(4)),
            ..RequestContext::default()
        };

        let body = batch_body(&envelope, &context);

        assert_eq!(body["Header"]["context"]["session"]["id"], "s-1");
        assert_eq!(body["Header"]["context"]["notify"]["seq"], 4);
        let batch = &body["Body"]["BatchRequest"];
        assert_eq!(batch["onerror"], "continue");
        assert_eq!(batch["GetFolderRequest"][0]["requestId"], "0");
        assert_eq!(batch["GetFolderRequest"][1]["requestId"], "2");
        assert_eq!(batch["GetFolderRequest"][1]["depth"], 2);
        assert_eq!(batch["GetInfoRequest"][0]["_jsns"], "urn:zimbraAccount");
    }

    #[test]
    fn header_omits_unknown_sequence_and_session() {
        let descriptor = RequestDescriptor::new("NoOp", json!({})).account("boss@example.com");
        let context = RequestContext {
            account: descriptor.account.clone(),
            ..RequestContext::default()
        };

        let body = single_body(&descriptor, &context);
        let header = &body["Header"]["context"];

        assert!(header.get("notify").is_none());
        assert!(header.get("session").is_none());
        assert_eq!(header["account"]["_content"], "boss@example.com");
        assert_eq!(body["Body"]["NoOpRequest"]["_jsns"], "urn:zimbraMail");
    }

    #[test]
    fn decode_batch_matches_request_ids_and_faults() {
        let document = json!({
            "Header": {"context": {"session": {"id": "77", "_content": "77"}}},
            "Body": {"BatchResponse": {
                "GetFolderResponse": [{"requestId": "0", "folder": [{"id": "1"}]}],
                "Fault": [{
                    "requestId": "1",
                    "Reason": {"Text": "no such folder id: 99"},
                    "Detail": {"Error": {"Code": "mail.NO_SUCH_FOLDER"}}
                }],
                "_jsns": "urn:zimbra"
            }}
        });

        let response = decode_batch(&document, 2).expect("batch should decode");

        assert_eq!(response.header.session_id, Some(SessionId::from("77")));
        assert_eq!(response.items.len(), 2);
        let first = &response.items[0];
        assert_eq!(first.index, 0);
        assert_eq!(
            first.result.as_ref().expect("item 0 should succeed"),
            &json!({"folder": [{"id": "1"}]})
        );
        let second = &response.items[1];
        assert_eq!(second.index, 1);
        let fault = second.result.as_ref().expect_err("item 1 should fault");
        assert_eq!(fault.code.as_deref(), Some("mail.NO_SUCH_FOLDER"));
    }

    #[test]
    fn top_level_fault_applies_to_every_item() {
        let document = json!({
            "Body": {"Fault": {"Reason": {"Text": "auth credentials have expired"}}}
        });

        let response = decode_batch(&document, 3).expect("fault document should decode");

        assert_eq!(response.items.len(), 3);
        assert!(response.items.iter().all(|item| item.result.is_err()));
    }

    #[test]
    fn decode_single_returns_response_element() {
        let document = json!({"Body": {"NoOpResponse": {"_jsns": "urn:zimbraMail", "waitDisallowed": false}}});

        let response = decode_single(&document).expect("single should decode");

        assert_eq!(response.items.len(), 1);
        assert_eq!(
            response.items[0].result.as_ref().expect("noop should succeed"),
            &json!({"waitDisallowed": false})
        );
    }

    #[test]
    fn header_flattens_changes_in_section_order() {
        let document = json!({"Header": {"context": {
            "notify": [{
                "seq": 12,
                "deleted": {"id": "300,301"},
                "modified": {"folder": [{"id": "2", "u": 4}]},
                "created": {"m": [{"id": "300"}, {"id": "301"}]}
            }],
            "refresh": {"folder": [{"id": "1"}]}
        }}});

        let header = decode_header(&document);
        let delta = header.notify.expect("delta should decode");

        assert_eq!(delta.sequence, Sequence(12));
        assert_eq!(delta.changes.len(), 4);
        assert!(matches!(&delta.changes[0], ChangeRecord::Created { kind, .. } if kind == "m"));
        assert!(matches!(&delta.changes[2], ChangeRecord::Modified { kind, .. } if kind == "folder"));
        assert_eq!(
            delta.changes[3],
            ChangeRecord::Deleted {
                ids: vec!["300".to_string(), "301".to_string()]
            }
        );

        let refresh = header.refresh.expect("refresh should decode");
        assert_eq!(refresh.sequence, Sequence(12));
    }

    #[test]
    fn missing_body_is_a_decode_error() {
        assert!(decode_batch(&json!({"Header": {}}), 1).is_err());
        assert!(decode_single(&json!({})).is_err());
    }
}
