use courier_core::{ChangeRecord, Fault, Namespace, RequestDescriptor, Sequence};
use serde_json::json;

#[test]
fn descriptor_lane_follows_single_flag_and_account() {
    let plain = RequestDescriptor::new("GetFolder", json!({}));
    assert!(plain.is_batchable());
    assert_eq!(plain.namespace, Namespace::Mail);

    let single = RequestDescriptor::new("NoOp", json!({})).single();
    assert!(!single.is_batchable());

    let delegated = RequestDescriptor::new("GetFolder", json!({})).account("other@example.com");
    assert!(!delegated.is_batchable());
    assert!(!delegated.single_request);
}

#[test]
fn namespace_urns_match_wire_names() {
    assert_eq!(Namespace::Mail.urn(), "urn:zimbraMail");
    assert_eq!(Namespace::Account.urn(), "urn:zimbraAccount");
}

#[test]
fn change_record_uses_tagged_json() {
    let record = ChangeRecord::Deleted {
        ids: vec!["257".to_string()],
    };
    let encoded = serde_json::to_value(&record).expect("record should encode");
    assert_eq!(encoded, json!({"type": "deleted", "ids": ["257"]}));
}

#[test]
fn fault_display_includes_code_when_known() {
    let fault = Fault::new(Some("mail.NO_SUCH_FOLDER".to_string()), "no such folder id: 99");
    assert_eq!(fault.to_string(), "mail.NO_SUCH_FOLDER: no such folder id: 99");

    let anonymous = Fault::new(None, "boom");
    assert_eq!(anonymous.to_string(), "fault: boom");
}

#[test]
fn sequences_order_numerically() {
    assert!(Sequence(9) < Sequence(10));
}
