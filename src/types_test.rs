use super::*;

// =============================================================
// Role
// =============================================================

#[test]
fn role_deserializes_known_values() {
    let role: Role = serde_json::from_str("\"collector\"").unwrap();
    assert_eq!(role, Role::Collector);
    let role: Role = serde_json::from_str("\"member\"").unwrap();
    assert_eq!(role, Role::Member);
}

#[test]
fn role_unknown_value_is_unrecognized() {
    let role: Role = serde_json::from_str("\"admin\"").unwrap();
    assert_eq!(role, Role::Unrecognized);
}

#[test]
fn unknown_role_persists_as_unrecognized() {
    let raw = r#"{"id":"u1","name":"N","phone":"1","role":"admin","gender":"f"}"#;
    let user: User = serde_json::from_str(raw).unwrap();

    let persisted = serde_json::to_string(&user).unwrap();
    assert!(persisted.contains("\"role\":\"unrecognized\""));
    assert!(!persisted.contains("admin"));

    let reloaded: User = serde_json::from_str(&persisted).unwrap();
    assert_eq!(reloaded.role, Role::Unrecognized);
}

#[test]
fn role_selector_only_accepts_known_roles() {
    assert_eq!(Role::from_selector("collector"), Some(Role::Collector));
    assert_eq!(Role::from_selector("member"), Some(Role::Member));
    assert_eq!(Role::from_selector("unrecognized"), None);
    assert_eq!(Role::from_selector("Collector"), None);
}

#[test]
fn role_display_matches_wire_name() {
    assert_eq!(Role::Member.to_string(), "member");
    assert_eq!(serde_json::to_string(&Role::Collector).unwrap(), "\"collector\"");
}

// =============================================================
// User
// =============================================================

#[test]
fn user_accepts_numeric_id() {
    let user: User = serde_json::from_value(serde_json::json!({
        "id": 42,
        "name": "Abebe",
        "email": null,
        "phone": "0911000000",
        "role": "collector",
        "gender": "male"
    }))
    .unwrap();
    assert_eq!(user.id, "42");
    assert_eq!(user.email, None);
    assert_eq!(user.role, Role::Collector);
}

#[test]
fn user_missing_email_defaults_to_none() {
    let user: User = serde_json::from_value(serde_json::json!({
        "id": "u1",
        "name": "Sara",
        "phone": "0922000000",
        "role": "member",
        "gender": "female"
    }))
    .unwrap();
    assert!(user.email.is_none());
}

#[test]
fn user_rejects_object_id() {
    let result = serde_json::from_value::<User>(serde_json::json!({
        "id": {"nested": true},
        "name": "x",
        "phone": "1",
        "role": "member",
        "gender": "f"
    }));
    assert!(result.is_err());
}

// =============================================================
// Payloads
// =============================================================

#[test]
fn signup_request_omits_absent_email() {
    let req = SignupRequest {
        name: "Sara".to_owned(),
        email: None,
        phone: "0922000000".to_owned(),
        password: "pw".to_owned(),
        role: Role::Member,
        gender: "female".to_owned(),
    };
    let value = serde_json::to_value(&req).unwrap();
    assert!(value.get("email").is_none());
    assert_eq!(value["role"], "member");
}

#[test]
fn signup_response_tolerates_missing_fields() {
    let resp: SignupResponse = serde_json::from_str("{\"token\":\"t\"}").unwrap();
    assert_eq!(resp.token.as_deref(), Some("t"));
    assert!(resp.user.is_none());
}

#[test]
fn error_body_message_is_optional() {
    let body: ErrorBody = serde_json::from_str("{}").unwrap();
    assert!(body.message.is_none());
    let body: ErrorBody = serde_json::from_str("{\"message\":\"invalid credentials\"}").unwrap();
    assert_eq!(body.message.as_deref(), Some("invalid credentials"));
}

// =============================================================
// Iqub
// =============================================================

fn iqub_json() -> serde_json::Value {
    serde_json::json!({
        "id": 3,
        "name": "Merkato Traders",
        "collector_id": 17,
        "saving_pattern": 7,
        "saving_amount": "500.00",
        "credit_pattern": "30",
        "credit_amount": 10000,
        "members_count": 20,
        "current_members": 12,
        "status": "active",
        "members": [
            {"id": 1, "user_id": 21, "iqub_id": 3, "name": "Hana", "saving_rounds": "4"}
        ],
        "total_collected": 6000,
        "next_lottery_date": null
    })
}

#[test]
fn iqub_normalizes_numeric_and_string_fields() {
    let iqub: Iqub = serde_json::from_value(iqub_json()).unwrap();
    assert_eq!(iqub.id, "3");
    assert_eq!(iqub.collector_id, "17");
    assert_eq!(iqub.saving_pattern, "7");
    assert_eq!(iqub.saving_amount, "500.00");
    assert_eq!(iqub.credit_amount, "10000");
    assert_eq!(iqub.total_collected.as_deref(), Some("6000"));
    assert!(iqub.next_lottery_date.is_none());
    assert_eq!(iqub.open_seats(), Some(8));

    let members = iqub.members.unwrap();
    assert_eq!(members[0].user_id, "21");
    assert!(members[0].phone.is_none());
}

#[test]
fn iqub_optional_fields_may_be_absent() {
    let iqub: Iqub = serde_json::from_value(serde_json::json!({
        "id": "9",
        "name": "New",
        "collector_id": "1",
        "saving_pattern": 1,
        "saving_amount": 1,
        "credit_pattern": 1,
        "credit_amount": 1,
        "members_count": 5
    }))
    .unwrap();
    assert!(iqub.members.is_none());
    assert!(iqub.total_collected.is_none());
    assert_eq!(iqub.open_seats(), None);
}

#[test]
fn iqub_list_accepts_bare_and_wrapped_bodies() {
    let bare: IqubList = serde_json::from_value(serde_json::json!([iqub_json()])).unwrap();
    assert_eq!(bare.into_iqubs().len(), 1);

    let wrapped: IqubList = serde_json::from_value(serde_json::json!({ "iqubs": [iqub_json()] })).unwrap();
    assert_eq!(wrapped.into_iqubs()[0].name, "Merkato Traders");

    let data: IqubList = serde_json::from_value(serde_json::json!({ "data": [] })).unwrap();
    assert!(data.into_iqubs().is_empty());
}
