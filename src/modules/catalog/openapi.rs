use serde_json::{json, Value};

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: Value) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn redirect(description: &str) -> Value {
    json!({
        "description": description,
        "headers": { "Location": { "schema": { "type": "string" } } }
    })
}

fn page_of(schema: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "items": { "type": "array", "items": { "$ref": format!("#/components/schemas/{schema}") } },
            "number": { "type": "integer" },
            "num_pages": { "type": "integer" },
            "count": { "type": "integer" },
            "per_page": { "type": "integer" },
            "has_next": { "type": "boolean" },
            "has_previous": { "type": "boolean" },
            "is_paginated": { "type": "boolean" }
        }
    })
}

fn page_param() -> Value {
    json!({
        "name": "page",
        "in": "query",
        "required": false,
        "description": "1-based page number or `last`",
        "schema": { "type": "string" }
    })
}

fn id_param(description: &str) -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": description,
        "schema": { "type": "string" }
    })
}

fn form_body(schema: &str) -> Value {
    json!({
        "required": true,
        "content": {
            "application/x-www-form-urlencoded": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn form_post(summary: &str, form: Option<&str>, with_id: bool, success: &str) -> Value {
    let mut operation = json!({
        "summary": summary,
        "tags": ["Catalog"],
        "responses": {
            "302": redirect(success),
            "403": error_response("Caller lacks the required capability"),
            "404": error_response("No such record"),
            "409": error_response("Transition or delete not allowed"),
            "422": error_response("Invalid form fields")
        }
    });
    if let Some(form) = form {
        operation["requestBody"] = form_body(form);
    }
    if with_id {
        operation["parameters"] = json!([id_param("Record identifier")]);
    }
    json!({ "post": operation })
}

/// OpenAPI fragment for the catalog routes, relative to the module mount.
pub fn document() -> Value {
    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "Catalog dashboard counts",
                    "tags": ["Catalog"],
                    "responses": {
                        "200": json_response("Counts", json!({ "$ref": "#/components/schemas/Dashboard" }))
                    }
                }
            },
            "/books": {
                "get": {
                    "summary": "List books",
                    "tags": ["Catalog"],
                    "parameters": [page_param()],
                    "responses": {
                        "200": json_response("One page of books", page_of("Book")),
                        "404": error_response("Page out of range")
                    }
                }
            },
            "/book/{id}": {
                "get": {
                    "summary": "Book detail with its copies",
                    "tags": ["Catalog"],
                    "parameters": [id_param("Book id")],
                    "responses": {
                        "200": json_response("Book", json!({ "$ref": "#/components/schemas/Book" })),
                        "404": error_response("No such book")
                    }
                }
            },
            "/authors": {
                "get": {
                    "summary": "List authors",
                    "tags": ["Catalog"],
                    "parameters": [page_param()],
                    "responses": {
                        "200": json_response("One page of authors", page_of("Author")),
                        "404": error_response("Page out of range")
                    }
                }
            },
            "/author/{id}": {
                "get": {
                    "summary": "Author detail with their books",
                    "tags": ["Catalog"],
                    "parameters": [id_param("Author id")],
                    "responses": {
                        "200": json_response("Author", json!({ "$ref": "#/components/schemas/Author" })),
                        "404": error_response("No such author")
                    }
                }
            },
            "/genres": {
                "get": {
                    "summary": "List genres",
                    "tags": ["Catalog"],
                    "responses": { "200": json_response("Genres", json!({ "type": "array" })) }
                }
            },
            "/languages": {
                "get": {
                    "summary": "List languages",
                    "tags": ["Catalog"],
                    "responses": { "200": json_response("Languages", json!({ "type": "array" })) }
                }
            },
            "/mybooks": {
                "get": {
                    "summary": "Copies the caller has on loan, soonest due first",
                    "tags": ["Loans"],
                    "parameters": [page_param()],
                    "responses": {
                        "200": json_response("One page of loans", page_of("Loan")),
                        "302": redirect("Not logged in")
                    }
                }
            },
            "/borrowed": {
                "get": {
                    "summary": "Every copy on loan, soonest due first",
                    "tags": ["Loans"],
                    "parameters": [page_param()],
                    "responses": {
                        "200": json_response("One page of loans", page_of("Loan")),
                        "302": redirect("Not logged in"),
                        "403": error_response("Caller cannot mark copies returned")
                    }
                }
            },
            "/book/{id}/renew": {
                "get": {
                    "summary": "Renewal form for a copy on loan",
                    "tags": ["Loans"],
                    "parameters": [id_param("Copy id")],
                    "responses": {
                        "200": json_response("Copy and proposed renewal date", json!({ "type": "object" })),
                        "302": redirect("Not logged in"),
                        "403": error_response("Caller cannot mark copies returned"),
                        "404": error_response("No such copy")
                    }
                },
                "post": {
                    "summary": "Renew a copy on loan",
                    "tags": ["Loans"],
                    "parameters": [id_param("Copy id")],
                    "requestBody": form_body("RenewalForm"),
                    "responses": {
                        "302": redirect("Renewed; see all loans"),
                        "403": error_response("Caller cannot mark copies returned"),
                        "404": error_response("No such copy"),
                        "409": error_response("Copy is not on loan"),
                        "422": error_response("Date outside the renewal window")
                    }
                }
            },
            "/instances": form_post("Add a copy of a book", Some("InstanceForm"), false, "Copy added"),
            "/instances/{id}/status": form_post("Set the status of a copy that is not on loan", Some("StatusForm"), true, "Status changed"),
            "/instances/{id}/issue": form_post("Lend a copy", Some("IssueForm"), true, "Copy issued"),
            "/instances/{id}/return": form_post("Take a copy back", None, true, "Copy returned"),
            "/author/create": form_post("Create an author", Some("AuthorForm"), false, "Created"),
            "/author/{id}/update": form_post("Update an author", Some("AuthorForm"), true, "Updated"),
            "/author/{id}/delete": form_post("Delete an author", None, true, "Deleted"),
            "/book/create": form_post("Create a book", Some("BookForm"), false, "Created"),
            "/book/{id}/update": form_post("Update a book", Some("BookForm"), true, "Updated"),
            "/book/{id}/delete": form_post("Delete a book", None, true, "Deleted")
        },
        "components": {
            "schemas": {
                "Dashboard": {
                    "type": "object",
                    "properties": {
                        "num_books": { "type": "integer" },
                        "num_instances": { "type": "integer" },
                        "num_instances_available": { "type": "integer" },
                        "num_instances_status_available": { "type": "integer" },
                        "num_authors": { "type": "integer" },
                        "num_genres": { "type": "integer" },
                        "num_visits": { "type": "integer" }
                    }
                },
                "Author": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "first_name": { "type": "string", "maxLength": 100 },
                        "last_name": { "type": "string", "maxLength": 100 },
                        "date_of_birth": { "type": "string", "format": "date", "nullable": true },
                        "date_of_death": { "type": "string", "format": "date", "nullable": true }
                    },
                    "required": ["id", "first_name", "last_name"]
                },
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string", "maxLength": 200 },
                        "author": { "type": "integer", "nullable": true },
                        "summary": { "type": "string", "maxLength": 1000 },
                        "isbn": { "type": "string", "maxLength": 13 },
                        "genres": { "type": "array", "items": { "type": "integer" } },
                        "languages": { "type": "array", "items": { "type": "integer" } }
                    },
                    "required": ["id", "title", "summary", "isbn"]
                },
                "Loan": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "book": { "type": "integer" },
                        "imprint": { "type": "string" },
                        "status": { "type": "string", "enum": ["m", "o", "a", "r"] },
                        "borrower": { "type": "string", "nullable": true },
                        "due_back": { "type": "string", "format": "date", "nullable": true },
                        "title": { "type": "string" },
                        "is_overdue": { "type": "boolean" }
                    }
                },
                "RenewalForm": {
                    "type": "object",
                    "properties": { "renewal_date": { "type": "string", "format": "date" } },
                    "required": ["renewal_date"]
                },
                "InstanceForm": {
                    "type": "object",
                    "properties": { "book": { "type": "integer" }, "imprint": { "type": "string" } },
                    "required": ["book", "imprint"]
                },
                "StatusForm": {
                    "type": "object",
                    "properties": { "status": { "type": "string", "enum": ["m", "a", "r"] } },
                    "required": ["status"]
                },
                "IssueForm": {
                    "type": "object",
                    "properties": {
                        "borrower": { "type": "string" },
                        "due_back": { "type": "string", "format": "date" }
                    },
                    "required": ["borrower", "due_back"]
                },
                "AuthorForm": {
                    "type": "object",
                    "properties": {
                        "first_name": { "type": "string" },
                        "last_name": { "type": "string" },
                        "date_of_birth": { "type": "string", "format": "date" },
                        "date_of_death": { "type": "string", "format": "date" }
                    },
                    "required": ["first_name", "last_name"]
                },
                "BookForm": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "integer" },
                        "summary": { "type": "string" },
                        "isbn": { "type": "string" },
                        "genres": { "type": "string", "description": "Comma-separated genre ids" },
                        "languages": { "type": "string", "description": "Comma-separated language ids" }
                    },
                    "required": ["title", "summary", "isbn"]
                }
            }
        }
    })
}
