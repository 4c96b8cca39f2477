use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chopin_bind::prelude::*;
use parking_lot::Mutex;
use serde_json::{json, Value};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Bindable)]
pub struct User {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Bindable)]
pub struct UpdateUser {
    pub id: i64,
    pub name: String,
    pub token: String,
    pub session_id: String,
    pub age: u8,
    pub admin: Option<bool>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Bindable)]
pub struct Session {
    pub id: i64,
    pub ratio: f64,
    pub session_id: String,
}

type Results = Arc<Mutex<Vec<(Option<Value>, Option<BindError>)>>>;

/// Route results of this handler into a vector instead of the global
/// collaborator.
fn capture(options: BindOptions) -> (BindOptions, Results) {
    let results = Results::default();
    let sink = results.clone();
    let options = options.response(move |_ctx, data, error| sink.lock().push((data, error)));
    (options, results)
}

fn only<T>(results: &Mutex<Vec<T>>) -> T {
    let mut results = results.lock();
    assert_eq!(results.len(), 1, "expected exactly one result");
    results.remove(0)
}

#[test]
fn test_path_param_scalar_reaches_handler() {
    let (options, results) = capture(BindOptions::new().path_names(["id"]));
    let handler = register(
        |_ctx: RequestContext, id: i64| -> Result<User, BindError> {
            Ok(User {
                id,
                name: "ada".to_string(),
            })
        },
        options,
    );

    let ctx = Context::builder().uri("/users/42").param("id", "42").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Responded);

    let (data, error) = only(&results);
    assert_eq!(data, Some(json!({"id": 42, "name": "ada"})));
    assert!(error.is_none());
}

#[test]
fn test_bad_scalar_never_calls_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (options, results) = capture(BindOptions::new().path_names(["id"]));
    let handler = register(
        move |_ctx: RequestContext, id: i64| -> Result<User, BindError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(User {
                id,
                ..User::default()
            })
        },
        options,
    );

    let ctx = Context::builder().uri("/users/abc").param("id", "abc").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Responded);

    let (data, error) = only(&results);
    assert!(data.is_none());
    let error = error.unwrap();
    assert_eq!(error.error_code(), "INVALID_VALUE");
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    assert!(error.is_binding());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_writer_handler_owns_response() {
    let (options, results) = capture(BindOptions::new());
    let handler = register(
        |req: Request, w: ResponseWriter| -> Result<(), BindError> {
            w.set_status(StatusCode::ACCEPTED);
            w.write_str(req.uri().path());
            Ok(())
        },
        options,
    );

    let ctx = Context::builder().uri("/raw").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Delegated);
    assert!(results.lock().is_empty());
    assert_eq!(ctx.writer().status(), StatusCode::ACCEPTED);
    assert_eq!(ctx.writer().body(), b"/raw");
}

#[test]
fn test_writer_handler_error_is_reported() {
    let (options, results) = capture(BindOptions::new());
    let handler = register(
        |_req: Request, _w: ResponseWriter| -> Result<(), String> { Err("disk full".to_string()) },
        options,
    );

    let ctx = Context::builder().uri("/").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Responded);
    let (data, error) = only(&results);
    assert!(data.is_none());
    let error = error.unwrap();
    assert_eq!(error.to_string(), "disk full");
    assert_eq!(error.error_code(), "HANDLER_ERROR");
    assert!(!error.is_binding());
}

#[test]
fn test_writer_handler_with_data_still_responds() {
    let (options, results) = capture(BindOptions::new().query_name("id"));
    let handler = register(
        |_ctx: RequestContext, _w: ResponseWriter, id: u32| -> Result<u32, BindError> { Ok(id + 1) },
        options,
    );

    let ctx = Context::builder().uri("/?id=9").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Responded);
    let (data, _) = only(&results);
    assert_eq!(data, Some(json!(10)));
}

#[test]
fn test_three_arg_writer_handler_owns_response() {
    let (options, results) = capture(BindOptions::new().query_name("id"));
    let handler = register(
        |_ctx: RequestContext, w: ResponseWriter, id: u32| -> Result<(), BindError> {
            w.set_status(StatusCode::CREATED);
            w.write_str(&id.to_string());
            Ok(())
        },
        options,
    );

    let ctx = Context::builder().uri("/?id=5").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Delegated);
    assert!(results.lock().is_empty());
    assert_eq!(ctx.writer().status(), StatusCode::CREATED);
    assert_eq!(ctx.writer().body(), b"5");

    let ctx = Context::builder().uri("/?id=five").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Responded);
    assert_eq!(only(&results).1.unwrap().error_code(), "INVALID_VALUE");
    assert!(!ctx.writer().is_written());
}

#[test]
fn test_query_slice_binding() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (options, results) = capture(BindOptions::new().query_name("tag"));
    let handler = register(
        move |_ctx: RequestContext, names: Vec<String>| -> Result<(), BindError> {
            *sink.lock() = names;
            Ok(())
        },
        options,
    );

    let ctx = Context::builder().uri("/items?tag=a&tag=b").build().unwrap();
    assert_eq!(handler.handle(&ctx), Dispatch::Responded);
    assert_eq!(*seen.lock(), ["a", "b"]);
    let (data, error) = only(&results);
    assert!(data.is_none() && error.is_none());
}

#[test]
fn test_slice_falls_back_to_post_form() {
    let (options, results) = capture(BindOptions::new().query_name("id"));
    let handler = register(
        |_ctx: RequestContext, ids: Vec<u16>| -> Result<u32, BindError> {
            Ok(ids.iter().map(|id| u32::from(*id)).sum())
        },
        options,
    );

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/sum")
        .form(&[("id", "1"), ("id", "2"), ("id", "3")])
        .build()
        .unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!(6)));
}

#[test]
fn test_slice_errors() {
    let (options, results) = capture(BindOptions::new().query_name("id"));
    let handler = register(
        |_ctx: RequestContext, _ids: Vec<i32>| -> Result<(), BindError> { Ok(()) },
        options,
    );

    let ctx = Context::builder().uri("/?other=1").build().unwrap();
    handler.handle(&ctx);
    let error = only(&results).1.unwrap();
    assert_eq!(error.error_code(), "MISSING_VALUE");

    let ctx = Context::builder().uri("/?id=1&id=x").build().unwrap();
    handler.handle(&ctx);
    let error = only(&results).1.unwrap();
    assert_eq!(error.error_code(), "INVALID_VALUE");
}

#[test]
fn test_scalar_source_precedence() {
    let (options, results) = capture(
        BindOptions::new()
            .query_name("page")
            .path_names(["page"])
            .header_names(["x-page"])
            .cookie_names(["page"]),
    );
    let handler = register(
        |_ctx: RequestContext, page: u32| -> Result<u32, BindError> { Ok(page) },
        options,
    );

    let ctx = Context::builder()
        .uri("/?page=1")
        .param("page", "2")
        .header("x-page", "3")
        .cookie("page", "4")
        .build()
        .unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!(1)));

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/")
        .form(&[("page", "5")])
        .param("page", "2")
        .build()
        .unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!(5)));

    let ctx = Context::builder()
        .uri("/")
        .param("page", "")
        .header("x-page", "3")
        .cookie("page", "4")
        .build()
        .unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!(3)));

    let ctx = Context::builder().uri("/").cookie("page", "4").build().unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!(4)));

    let ctx = Context::builder().uri("/").build().unwrap();
    handler.handle(&ctx);
    let error = only(&results).1.unwrap();
    assert_eq!(error.error_code(), "MISSING_VALUE");
}

#[test]
fn test_empty_query_value_counts_as_present() {
    let (options, results) = capture(BindOptions::new().query_name("q").path_names(["q"]));
    let handler = register(
        |_ctx: RequestContext, q: String| -> Result<String, BindError> { Ok(format!("[{q}]")) },
        options,
    );

    let ctx = Context::builder().uri("/?q=").param("q", "path").build().unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!("[]")));
}

#[test]
fn test_struct_from_json_with_overrides() {
    let (options, results) = capture(
        BindOptions::new()
            .path_names(["id"])
            .header_names(["token"])
            .cookie_names(["session_id"]),
    );
    let handler = register(
        |_ctx: RequestContext, user: UpdateUser| -> Result<UpdateUser, BindError> { Ok(user) },
        options,
    );

    let ctx = Context::builder()
        .method(Method::PUT)
        .uri("/users/7")
        .json(&json!({"id": 1, "name": "ada", "tags": ["x"]}))
        .param("id", "7")
        .header("token", "t0k")
        .cookie("session_id", "s 1")
        .build()
        .unwrap();
    handler.handle(&ctx);

    let (data, error) = only(&results);
    assert!(error.is_none());
    let user: UpdateUser = serde_json::from_value(data.unwrap()).unwrap();
    assert_eq!(
        user,
        UpdateUser {
            id: 7,
            name: "ada".to_string(),
            token: "t0k".to_string(),
            session_id: "s 1".to_string(),
            tags: vec!["x".to_string()],
            ..UpdateUser::default()
        }
    );
}

#[test]
fn test_absent_override_is_missing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (options, results) = capture(BindOptions::new().path_names(["id"]).header_names(["token"]));
    let handler = register(
        move |_ctx: RequestContext, user: Box<UpdateUser>| -> Result<i64, BindError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(user.id)
        },
        options,
    );

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/users")
        .json(&json!({"id": 3}))
        .header("token", "t0k")
        .build()
        .unwrap();
    handler.handle(&ctx);
    let error = only(&results).1.unwrap();
    assert_eq!(error.error_code(), "MISSING_VALUE");
    assert_eq!(error.to_string(), "path parameter \"id\" is absent from the request");

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/users")
        .json(&json!({"id": 3}))
        .param("id", "7")
        .build()
        .unwrap();
    handler.handle(&ctx);
    let error = only(&results).1.unwrap();
    assert_eq!(error.to_string(), "header \"token\" is absent from the request");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_override_keeps_body_value() {
    let (options, results) = capture(BindOptions::new().path_names(["id"]).header_names(["token"]));
    let handler = register(
        |_ctx: RequestContext, user: Box<UpdateUser>| -> Result<i64, BindError> { Ok(user.id) },
        options,
    );

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/users")
        .json(&json!({"id": 3}))
        .param("id", "")
        .header("token", "")
        .build()
        .unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!(3)));
}

#[test]
fn test_absent_cookie_fails_binding() {
    let (options, results) = capture(BindOptions::new().cookie_names(["session_id"]));
    let handler = register(
        |_ctx: RequestContext, session: Session| -> Result<String, BindError> { Ok(session.session_id) },
        options,
    );

    let ctx = Context::builder().uri("/me").build().unwrap();
    handler.handle(&ctx);
    let (data, error) = only(&results);
    assert!(data.is_none());
    let error = error.unwrap();
    assert_eq!(error.error_code(), "MISSING_VALUE");
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error.to_string(), "cookie \"session_id\" is absent from the request");

    let ctx = Context::builder().uri("/me").cookie("session_id", "s-9").build().unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!("s-9")));
}

#[test]
fn test_non_finite_float_into_struct_field() {
    let (options, results) = capture(BindOptions::new().header_names(["ratio"]));
    let handler = register(
        |_ctx: RequestContext, session: Session| -> Result<String, BindError> {
            Ok(session.ratio.to_string())
        },
        options,
    );

    for (raw, expected) in [("NaN", "NaN"), ("inf", "inf"), ("-Infinity", "-inf"), ("0.25", "0.25")] {
        let ctx = Context::builder().uri("/").header("ratio", raw).build().unwrap();
        handler.handle(&ctx);
        let (data, error) = only(&results);
        assert!(error.is_none(), "{raw}: {error:?}");
        assert_eq!(data, Some(json!(expected)));
    }
}

#[test]
fn test_struct_from_query_on_get() {
    let (options, results) = capture(BindOptions::new());
    let handler = register(
        |_ctx: RequestContext, user: UpdateUser| -> Result<UpdateUser, BindError> { Ok(user) },
        options,
    );

    let ctx = Context::builder()
        .uri("/search?name=ada&age=36&admin=t&tags=a&tags=b")
        .build()
        .unwrap();
    handler.handle(&ctx);
    let user: UpdateUser = serde_json::from_value(only(&results).0.unwrap()).unwrap();
    assert_eq!(user.name, "ada");
    assert_eq!(user.age, 36);
    assert_eq!(user.admin, Some(true));
    assert_eq!(user.tags, ["a", "b"]);
    assert_eq!(user.id, 0);
}

#[test]
fn test_struct_override_errors_are_reported() {
    let (options, results) = capture(
        BindOptions::new()
            .path_names(["id"])
            .header_names(["age"])
            .cookie_names(["admin"]),
    );
    let handler = register(
        |_ctx: RequestContext, _user: UpdateUser| -> Result<(), BindError> { Ok(()) },
        options,
    );

    let request = |id: &str, age: &str, admin: &str| {
        Context::builder()
            .uri("/")
            .param("id", id)
            .header("age", age)
            .cookie("admin", admin)
            .build()
            .unwrap()
    };

    handler.handle(&request("7", "30", "t"));
    let (_, error) = only(&results);
    assert!(error.is_none());

    for ctx in [
        request("seven", "30", "t"),
        request("7", "300", "t"),
        request("7", "30", "maybe"),
    ] {
        handler.handle(&ctx);
        assert_eq!(only(&results).1.unwrap().error_code(), "INVALID_VALUE");
    }
}

#[test]
fn test_cookie_names_resolve_from_cookies() {
    let (options, results) = capture(
        BindOptions::new()
            .header_names(["token"])
            .cookie_names(["session_id"]),
    );
    let handler = register(
        |_ctx: RequestContext, user: UpdateUser| -> Result<UpdateUser, BindError> { Ok(user) },
        options,
    );

    let ctx = Context::builder()
        .uri("/")
        .header("token", "from-header")
        .cookie("session_id", "abc")
        .cookie("token", "from-cookie")
        .build()
        .unwrap();
    handler.handle(&ctx);
    let user: UpdateUser = serde_json::from_value(only(&results).0.unwrap()).unwrap();
    assert_eq!(user.session_id, "abc");
    assert_eq!(user.token, "from-header");
}

#[test]
fn test_invalid_json_body() {
    let (options, results) = capture(BindOptions::new());
    let handler = register(
        |_ctx: RequestContext, _user: User| -> Result<(), BindError> { Ok(()) },
        options,
    );

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/")
        .json(&json!({"id": "not a number"}))
        .build()
        .unwrap();
    handler.handle(&ctx);
    let error = only(&results).1.unwrap();
    assert_eq!(error.error_code(), "INVALID_BODY");
    assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn test_file_and_form_arguments() {
    let (options, results) = capture(BindOptions::new().file_name("avatar"));
    let upload = register(
        |_ctx: RequestContext, file: FileHeader| -> Result<Value, BindError> {
            Ok(json!({"name": file.filename(), "size": file.size()}))
        },
        options,
    );
    let (options, form_results) = capture(BindOptions::new());
    let whole = register(
        |_req: Request, form: Box<MultipartForm>| -> Result<Option<String>, BindError> {
            Ok(form.value("title").map(str::to_string))
        },
        options,
    );

    let form = MultipartForm::new()
        .with_value("title", "portrait")
        .with_file("avatar", FileHeader::new("me.png", Some("image/png".to_string()), "1234"));
    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/upload")
        .multipart_form(form)
        .build()
        .unwrap();

    upload.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!({"name": "me.png", "size": 4})));
    whole.handle(&ctx);
    assert_eq!(only(&form_results).0, Some(json!("portrait")));

    let ctx = Context::builder().uri("/upload").build().unwrap();
    upload.handle(&ctx);
    assert_eq!(only(&results).1.unwrap().error_code(), "NOT_MULTIPART");

    let ctx = Context::builder()
        .method(Method::POST)
        .uri("/upload")
        .multipart_form(MultipartForm::new())
        .build()
        .unwrap();
    upload.handle(&ctx);
    assert_eq!(only(&results).1.unwrap().error_code(), "MISSING_FILE");
}

#[test]
fn test_handler_returning_bind_error_keeps_its_code() {
    let (options, results) = capture(BindOptions::new());
    let handler = register(
        |_ctx: RequestContext| -> Result<(), BindError> { Err(BindError::Missing("account".to_string())) },
        options,
    );

    let ctx = Context::builder().uri("/").build().unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).1.unwrap().error_code(), "MISSING_VALUE");
}

#[test]
fn test_context_extensions_reach_handler() {
    #[derive(Clone)]
    struct Tenant(&'static str);

    let (options, results) = capture(BindOptions::new());
    let handler = register(
        |ctx: RequestContext| -> Result<String, BindError> {
            Ok(ctx.get::<Tenant>().map(|t| t.0).unwrap_or("none").to_string())
        },
        options,
    );

    let ctx = Context::builder()
        .uri("/")
        .extension(Tenant("acme"))
        .build()
        .unwrap();
    handler.handle(&ctx);
    assert_eq!(only(&results).0, Some(json!("acme")));
}
