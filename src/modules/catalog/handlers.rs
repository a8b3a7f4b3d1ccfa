use std::sync::Arc;

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use stacks_authz::{Authenticated, MaybeAuthenticated, Permission, RequiredCapability};
use stacks_db::Page;
use stacks_http::{found, AppError, Form, PageParams, Path, Query};

use super::descriptor::{Action, AuthorRecord, BookRecord, Editable};
use super::forms::{InstanceForm, IssueForm, RenewalForm, StatusForm};
use super::models::{Author, Book, Genre, InstanceId, Language};
use super::service::{AuthorDetail, BookDetail, Catalog, Dashboard, LoanView, RenewalView};
use super::MOUNT;

/// Librarian capability: see every loan, renew, issue and take back copies.
pub struct CanMarkReturned;

impl RequiredCapability for CanMarkReturned {
    const CAPABILITY: &'static str = "catalog.can_mark_returned";
}

type Librarian = Permission<CanMarkReturned>;

pub fn router(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/books", get(book_list))
        .route("/book/{id}", get(book_detail))
        .route("/authors", get(author_list))
        .route("/author/{id}", get(author_detail))
        .route("/genres", get(genre_list))
        .route("/languages", get(language_list))
        .route("/mybooks", get(my_loans))
        .route("/borrowed", get(all_loans))
        .route("/book/{id}/renew", get(renewal_form).post(renew))
        .route("/instances", post(create_instance))
        .route("/instances/{id}/status", post(set_status))
        .route("/instances/{id}/issue", post(issue))
        .route("/instances/{id}/return", post(mark_returned))
        .route("/author/create", post(create_record::<AuthorRecord>))
        .route("/author/{id}/update", post(update_record::<AuthorRecord>))
        .route("/author/{id}/delete", post(delete_record::<AuthorRecord>))
        .route("/book/create", post(create_record::<BookRecord>))
        .route("/book/{id}/update", post(update_record::<BookRecord>))
        .route("/book/{id}/delete", post(delete_record::<BookRecord>))
        .with_state(catalog)
}

/// Malformed ids name no record, so they are reported like unknown ones.
fn record_id(raw: &str) -> Result<u64, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("no record with id '{raw}'")))
}

fn instance_id(raw: &str) -> Result<InstanceId, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("no copy with id '{raw}'")))
}

fn book_url(book: u64) -> String {
    format!("{MOUNT}/book/{book}")
}

async fn dashboard(
    State(catalog): State<Arc<Catalog>>,
    MaybeAuthenticated(caller): MaybeAuthenticated,
) -> Result<Json<Dashboard>, AppError> {
    let visitor = caller.as_ref().map(|p| p.username.as_str());
    Ok(Json(catalog.dashboard(visitor).await?))
}

async fn book_list(
    State(catalog): State<Arc<Catalog>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Book>>, AppError> {
    Ok(Json(catalog.books_page(params.request()?).await?))
}

async fn book_detail(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<Json<BookDetail>, AppError> {
    Ok(Json(catalog.book_detail(record_id(&id)?).await?))
}

async fn author_list(
    State(catalog): State<Arc<Catalog>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Author>>, AppError> {
    Ok(Json(catalog.authors_page(params.request()?).await?))
}

async fn author_detail(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<Json<AuthorDetail>, AppError> {
    Ok(Json(catalog.author_detail(record_id(&id)?).await?))
}

async fn genre_list(State(catalog): State<Arc<Catalog>>) -> Result<Json<Vec<Genre>>, AppError> {
    Ok(Json(catalog.genres().await?))
}

async fn language_list(
    State(catalog): State<Arc<Catalog>>,
) -> Result<Json<Vec<Language>>, AppError> {
    Ok(Json(catalog.languages().await?))
}

async fn my_loans(
    State(catalog): State<Arc<Catalog>>,
    Authenticated(caller): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<LoanView>>, AppError> {
    let page = catalog
        .loans_of(&caller.username, params.request()?)
        .await?;
    Ok(Json(page))
}

async fn all_loans(
    State(catalog): State<Arc<Catalog>>,
    _librarian: Librarian,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<LoanView>>, AppError> {
    Ok(Json(catalog.all_loans(params.request()?).await?))
}

async fn renewal_form(
    State(catalog): State<Arc<Catalog>>,
    _librarian: Librarian,
    Path(id): Path<String>,
) -> Result<Json<RenewalView>, AppError> {
    Ok(Json(catalog.renewal_view(instance_id(&id)?).await?))
}

async fn renew(
    State(catalog): State<Arc<Catalog>>,
    librarian: Librarian,
    Path(id): Path<String>,
    Form(form): Form<RenewalForm>,
) -> Result<Response, AppError> {
    let id = instance_id(&id)?;
    let instance = catalog.renew(id, form.clean()?).await?;
    tracing::info!(
        module = "catalog",
        instance = %instance.id,
        due_back = ?instance.due_back(),
        user = %librarian.principal().username,
        "loan renewed"
    );
    Ok(found(format!("{MOUNT}/borrowed")))
}

async fn create_instance(
    State(catalog): State<Arc<Catalog>>,
    librarian: Librarian,
    Form(form): Form<InstanceForm>,
) -> Result<Response, AppError> {
    let (book, imprint) = form.clean()?;
    let instance = catalog.create_instance(book, imprint).await?;
    tracing::info!(
        module = "catalog",
        instance = %instance.id,
        book,
        user = %librarian.principal().username,
        "copy added"
    );
    Ok(found(book_url(instance.book)))
}

async fn set_status(
    State(catalog): State<Arc<Catalog>>,
    _librarian: Librarian,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Response, AppError> {
    let id = instance_id(&id)?;
    let instance = catalog.set_status(id, form.clean()?).await?;
    Ok(found(book_url(instance.book)))
}

async fn issue(
    State(catalog): State<Arc<Catalog>>,
    librarian: Librarian,
    Path(id): Path<String>,
    Form(form): Form<IssueForm>,
) -> Result<Response, AppError> {
    let id = instance_id(&id)?;
    let (borrower, due_back) = form.clean()?;
    let instance = catalog.issue(id, &borrower, due_back).await?;
    tracing::info!(
        module = "catalog",
        instance = %instance.id,
        borrower = %borrower,
        user = %librarian.principal().username,
        "copy issued"
    );
    Ok(found(book_url(instance.book)))
}

async fn mark_returned(
    State(catalog): State<Arc<Catalog>>,
    librarian: Librarian,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let instance = catalog.mark_returned(instance_id(&id)?).await?;
    tracing::info!(
        module = "catalog",
        instance = %instance.id,
        user = %librarian.principal().username,
        "copy returned"
    );
    Ok(found(book_url(instance.book)))
}

async fn create_record<R: Editable>(
    State(catalog): State<Arc<Catalog>>,
    Authenticated(caller): Authenticated,
    Form(form): Form<R::Form>,
) -> Result<Response, AppError> {
    R::TYPE.authorize(&caller, Action::Add)?;
    let id = R::create(&catalog, form).await?;
    tracing::info!(module = "catalog", model = R::TYPE.model, id, user = %caller.username, "record created");
    Ok(found(R::TYPE.detail_url(id)))
}

async fn update_record<R: Editable>(
    State(catalog): State<Arc<Catalog>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Form(form): Form<R::Form>,
) -> Result<Response, AppError> {
    R::TYPE.authorize(&caller, Action::Change)?;
    let id = record_id(&id)?;
    R::update(&catalog, id, form).await?;
    tracing::info!(module = "catalog", model = R::TYPE.model, id, user = %caller.username, "record updated");
    Ok(found(R::TYPE.detail_url(id)))
}

async fn delete_record<R: Editable>(
    State(catalog): State<Arc<Catalog>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    R::TYPE.authorize(&caller, Action::Delete)?;
    let id = record_id(&id)?;
    R::delete(&catalog, id).await?;
    tracing::info!(module = "catalog", model = R::TYPE.model, id, user = %caller.username, "record deleted");
    Ok(found(R::TYPE.list_url()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::forms::{AuthorForm, BookForm};
    use crate::modules::catalog::models::{BookInstance, LoanStatus};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        middleware,
    };
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use stacks_authz::{authenticate, Authenticator, Policy};
    use stacks_kernel::{settings::CatalogSettings, FixedClock};
    use time::{macros::date, Date, Duration};
    use tower::ServiceExt;

    const TODAY: Date = date!(2024 - 03 - 01);

    async fn fresh_catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(
            crate::testing::database().await,
            &CatalogSettings::default(),
            Arc::new(FixedClock::on(TODAY)),
        ))
    }

    fn app(catalog: Arc<Catalog>) -> Router {
        let policy = Policy::new()
            .grant("librarian", CanMarkReturned::CAPABILITY)
            .grant("librarian", "catalog.add_author")
            .grant("librarian", "catalog.change_author")
            .grant("librarian", "catalog.delete_author")
            .grant("librarian", "catalog.delete_book");
        let authenticator =
            Authenticator::new(policy, "x-remote-user", "/accounts/login/").unwrap();
        Router::new()
            .nest(MOUNT, router(catalog))
            .layer(middleware::from_fn_with_state(authenticator, authenticate))
    }

    async fn send(
        catalog: &Arc<Catalog>,
        method: &str,
        uri: &str,
        user: Option<&str>,
        form: Option<&str>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header("x-remote-user", user);
        }
        let body = match form {
            Some(form) => {
                request = request.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };
        app(catalog.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn lent_copy(catalog: &Catalog, borrower: &str, due: Date) -> BookInstance {
        let book = catalog
            .create_book(
                BookForm {
                    title: "Book Title".to_string(),
                    summary: "My book summary".to_string(),
                    isbn: "ABCDEFG".to_string(),
                    ..BookForm::default()
                }
                .clean()
                .unwrap(),
            )
            .await
            .unwrap();
        let copy = catalog
            .create_instance(book.id, "Unlikely Imprint, 2016".to_string())
            .await
            .unwrap();
        catalog
            .set_status(copy.id, LoanStatus::Available)
            .await
            .unwrap();
        catalog.issue(copy.id, borrower, due).await.unwrap()
    }

    fn renew_uri(copy: &BookInstance) -> String {
        format!("{MOUNT}/book/{}/renew", copy.id)
    }

    #[tokio::test]
    async fn renewal_requires_login() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;
        let uri = renew_uri(&copy);

        let response = send(&catalog, "GET", &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("/accounts/login/?next={uri}"));
    }

    #[tokio::test]
    async fn renewal_is_forbidden_without_capability_whether_or_not_the_copy_exists() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;

        let existing = send(&catalog, "GET", &renew_uri(&copy), Some("tara1"), None).await;
        assert_eq!(existing.status(), StatusCode::FORBIDDEN);

        let missing_uri = format!("{MOUNT}/book/{}/renew", InstanceId::new());
        let missing = send(&catalog, "GET", &missing_uri, Some("tara1"), None).await;
        assert_eq!(missing.status(), StatusCode::FORBIDDEN);

        let garbage = send(
            &catalog,
            "POST",
            &format!("{MOUNT}/book/not-a-uuid/renew"),
            Some("tara1"),
            Some("renewal_date=2024-03-05"),
        )
        .await;
        assert_eq!(garbage.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn renewal_of_unknown_or_malformed_copy_is_not_found() {
        let catalog = fresh_catalog().await;
        let missing_uri = format!("{MOUNT}/book/{}/renew", InstanceId::new());
        let missing = send(&catalog, "GET", &missing_uri, Some("librarian"), None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let garbage = send(
            &catalog,
            "GET",
            &format!("{MOUNT}/book/42/renew"),
            Some("librarian"),
            None,
        )
        .await;
        assert_eq!(garbage.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn renewal_form_proposes_three_weeks() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;

        let response = send(&catalog, "GET", &renew_uri(&copy), Some("librarian"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["renewal_date"], "2024-03-22");
        assert_eq!(body["instance"]["status"], "o");
    }

    #[tokio::test]
    async fn renewal_accepts_four_weeks_and_redirects_to_all_loans() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;
        let limit = TODAY + Duration::days(28);

        let response = send(
            &catalog,
            "POST",
            &renew_uri(&copy),
            Some("librarian"),
            Some(&format!("renewal_date={limit}")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/api/catalog/borrowed");

        let renewed = catalog.instance(copy.id).await.unwrap();
        assert_eq!(renewed.due_back(), Some(limit));
        assert_eq!(renewed.borrower(), Some("tara1"));
        assert_eq!(renewed.status(), LoanStatus::OnLoan);
    }

    #[tokio::test]
    async fn renewal_rejects_dates_outside_the_window() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;

        for (date, message) in [
            (
                TODAY + Duration::days(29),
                "Invalid date - renewal more than 4 weeks ahead",
            ),
            (TODAY - Duration::days(1), "Invalid date - renewal in past"),
        ] {
            let response = send(
                &catalog,
                "POST",
                &renew_uri(&copy),
                Some("librarian"),
                Some(&format!("renewal_date={date}")),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let body = json(response).await;
            assert_eq!(body["error"]["details"][0]["field"], "renewal_date");
            assert_eq!(body["error"]["details"][0]["error"], message);
        }

        assert_eq!(
            catalog.instance(copy.id).await.unwrap().due_back(),
            Some(TODAY)
        );
    }

    #[tokio::test]
    async fn renewal_without_a_form_body_gets_the_error_envelope() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;

        let request = Request::builder()
            .method("POST")
            .uri(renew_uri(&copy))
            .header("x-remote-user", "librarian")
            .body(Body::from("renewal_date=2024-03-05"))
            .unwrap();
        let response = app(catalog.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["trace_id"].is_string());

        assert_eq!(
            catalog.instance(copy.id).await.unwrap().due_back(),
            Some(TODAY)
        );
    }

    #[tokio::test]
    async fn loan_desk_reports_unknown_copies_as_not_found() {
        let catalog = fresh_catalog().await;
        let unknown = InstanceId::new();

        for (path, form) in [
            ("renew", "renewal_date=2024-03-05"),
            ("status", "status=a"),
            ("issue", "borrower=tara1&due_back=2024-03-10"),
        ] {
            let uri = if path == "renew" {
                format!("{MOUNT}/book/{unknown}/renew")
            } else {
                format!("{MOUNT}/instances/{unknown}/{path}")
            };
            let response = send(&catalog, "POST", &uri, Some("librarian"), Some(form)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
            assert_eq!(json(response).await["error"]["code"], "not_found", "{path}");
        }
    }

    #[tokio::test]
    async fn my_loans_lists_only_the_callers_copies() {
        let catalog = fresh_catalog().await;
        for offset in [10, 3, 7] {
            lent_copy(&catalog, "tara1", TODAY + Duration::days(offset)).await;
            lent_copy(&catalog, "mikhail", TODAY + Duration::days(offset)).await;
        }

        let response = send(&catalog, "GET", "/api/catalog/mybooks", Some("tara1"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item["borrower"] == "tara1"));
        let due: Vec<&str> = items
            .iter()
            .map(|item| item["due_back"].as_str().unwrap())
            .collect();
        assert_eq!(due, vec!["2024-03-04", "2024-03-08", "2024-03-11"]);
    }

    #[tokio::test]
    async fn my_loans_redirects_anonymous_callers() {
        let catalog = fresh_catalog().await;
        let response = send(&catalog, "GET", "/api/catalog/mybooks", None, None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            "/accounts/login/?next=/api/catalog/mybooks"
        );
    }

    #[tokio::test]
    async fn all_loans_is_forbidden_to_readers() {
        let catalog = fresh_catalog().await;
        lent_copy(&catalog, "tara1", TODAY).await;

        let reader = send(&catalog, "GET", "/api/catalog/borrowed", Some("tara1"), None).await;
        assert_eq!(reader.status(), StatusCode::FORBIDDEN);

        let librarian =
            send(&catalog, "GET", "/api/catalog/borrowed", Some("librarian"), None).await;
        assert_eq!(librarian.status(), StatusCode::OK);
        assert_eq!(json(librarian).await["count"], 1);
    }

    #[tokio::test]
    async fn author_list_paginates_by_ten() {
        let catalog = fresh_catalog().await;
        for n in 0..13 {
            catalog
                .create_author(
                    AuthorForm {
                        first_name: "Christian".to_string(),
                        last_name: format!("Surname {n}"),
                        ..AuthorForm::default()
                    }
                    .clean()
                    .unwrap(),
                )
                .await
                .unwrap();
        }

        let first = json(send(&catalog, "GET", "/api/catalog/authors", None, None).await).await;
        assert_eq!(first["items"].as_array().unwrap().len(), 10);
        assert_eq!(first["is_paginated"], true);

        let last =
            json(send(&catalog, "GET", "/api/catalog/authors?page=2", None, None).await).await;
        assert_eq!(last["items"].as_array().unwrap().len(), 3);

        let beyond = send(&catalog, "GET", "/api/catalog/authors?page=3", None, None).await;
        assert_eq!(beyond.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_book_list_is_a_valid_first_page() {
        let catalog = fresh_catalog().await;
        let response = send(&catalog, "GET", "/api/catalog/books", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["count"], 0);
    }

    #[tokio::test]
    async fn author_crud_round() {
        let catalog = fresh_catalog().await;

        let created = send(
            &catalog,
            "POST",
            "/api/catalog/author/create",
            Some("librarian"),
            Some("first_name=Ursula&last_name=Le+Guin&date_of_birth=1929-10-21"),
        )
        .await;
        assert_eq!(created.status(), StatusCode::FOUND);
        assert_eq!(location(&created), "/api/catalog/author/1");

        let updated = send(
            &catalog,
            "POST",
            "/api/catalog/author/1/update",
            Some("librarian"),
            Some("first_name=Ursula+K.&last_name=Le+Guin"),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::FOUND);
        assert_eq!(catalog.author(1).await.unwrap().first_name, "Ursula K.");

        let deleted = send(
            &catalog,
            "POST",
            "/api/catalog/author/1/delete",
            Some("librarian"),
            None,
        )
        .await;
        assert_eq!(deleted.status(), StatusCode::FOUND);
        assert_eq!(location(&deleted), "/api/catalog/authors");
        assert!(catalog.author(1).await.is_err());
    }

    #[tokio::test]
    async fn author_create_needs_capability_and_valid_fields() {
        let catalog = fresh_catalog().await;

        let forbidden = send(
            &catalog,
            "POST",
            "/api/catalog/author/create",
            Some("tara1"),
            Some("first_name=A&last_name=B"),
        )
        .await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let invalid = send(
            &catalog,
            "POST",
            "/api/catalog/author/create",
            Some("librarian"),
            Some("first_name=&last_name=B"),
        )
        .await;
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(catalog.authors_page(Default::default()).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn deleting_a_lent_book_is_a_conflict() {
        let catalog = fresh_catalog().await;
        let copy = lent_copy(&catalog, "tara1", TODAY).await;

        let response = send(
            &catalog,
            "POST",
            &format!("/api/catalog/book/{}/delete", copy.book),
            Some("librarian"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn loan_desk_walks_a_copy_through_its_life() {
        let catalog = fresh_catalog().await;
        let book = lent_copy(&catalog, "seed", TODAY).await.book;

        let created = send(
            &catalog,
            "POST",
            "/api/catalog/instances",
            Some("librarian"),
            Some(&format!("book={book}&imprint=Puffin%2C+1971")),
        )
        .await;
        assert_eq!(created.status(), StatusCode::FOUND);
        assert_eq!(location(&created), format!("/api/catalog/book/{book}"));

        let detail = json(send(&catalog, "GET", location(&created), None, None).await).await;
        let copy = detail["copies"]
            .as_array()
            .unwrap()
            .iter()
            .find(|copy| copy["status"] == "m")
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        let base = format!("/api/catalog/instances/{copy}");

        let premature = send(
            &catalog,
            "POST",
            &format!("{base}/issue"),
            Some("librarian"),
            Some("borrower=tara1&due_back=2024-03-10"),
        )
        .await;
        assert_eq!(premature.status(), StatusCode::CONFLICT);

        for (path, form) in [
            ("status", Some("status=a")),
            ("issue", Some("borrower=tara1&due_back=2024-03-10")),
            ("return", None),
        ] {
            let response = send(
                &catalog,
                "POST",
                &format!("{base}/{path}"),
                Some("librarian"),
                form,
            )
            .await;
            assert_eq!(response.status(), StatusCode::FOUND, "{path}");
        }

        let copy = catalog.instance(copy.parse().unwrap()).await.unwrap();
        assert_eq!(copy.status(), LoanStatus::Available);
        assert_eq!(copy.borrower(), None);
    }

    #[tokio::test]
    async fn dashboard_counts_visits_per_caller() {
        let catalog = fresh_catalog().await;
        let first = json(send(&catalog, "GET", "/api/catalog", Some("tara1"), None).await).await;
        let second = json(send(&catalog, "GET", "/api/catalog", Some("tara1"), None).await).await;
        let anonymous = json(send(&catalog, "GET", "/api/catalog", None, None).await).await;

        assert_eq!(first["num_visits"], 1);
        assert_eq!(second["num_visits"], 2);
        assert_eq!(anonymous["num_visits"], 1);
    }
}
