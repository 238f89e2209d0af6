pub fn sessions_fixture() -> &'static str {
    return r#"
[
  {
    "id": "a1b2c3",
    "state": "START_LOAD_MODEL",
    "type": "persistent",
    "created_at": "2023-10-21T14:03:11Z",
    "last_seen": "2023-10-21T14:05:40Z",
    "owner": "alice"
  },
  {
    "id": "d4e5f6",
    "state": "Running",
    "type": "readonly",
    "created_at": "2023-10-20T09:12:00Z",
    "last_seen": null,
    "owner": "bob"
  },
  {
    "id": "0f9e8d",
    "state": "ErrImagePull",
    "type": "training",
    "created_at": "2023-10-19T22:45:30Z"
  }
]
"#
    .trim();
}

pub fn session_json(id: &str, state: &str) -> String {
    return format!(
        r#"{{"id":"{id}","state":"{state}","type":"persistent","created_at":"2023-10-21T14:03:11Z","owner":"alice"}}"#
    );
}

pub fn sessions_json(sessions: &[(&str, &str)]) -> String {
    let records = sessions
        .iter()
        .map(|(id, state)| {
            return session_json(id, state);
        })
        .collect::<Vec<String>>()
        .join(",");

    return format!("[{records}]");
}
