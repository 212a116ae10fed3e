//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrow};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "0.3.0",
        description = "Library circulation REST API for students and librarians",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Auth
        auth::register_student,
        auth::register_librarian,
        auth::login,
        // Books
        books::list_books,
        books::list_available,
        books::get_book,
        books::add_book,
        books::delete_book,
        // Borrow
        borrow::borrow_book,
        borrow::my_loans,
        borrow::all_loans,
        borrow::return_book,
        borrow::stats,
    ),
    components(
        schemas(
            // Auth
            auth::AuthResponse,
            crate::models::account::Role,
            crate::models::account::RegisterStudent,
            crate::models::account::RegisterLibrarian,
            crate::models::account::LoginRequest,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            // Borrow
            borrow::BorrowRequest,
            borrow::BorrowResponse,
            borrow::ReturnResponse,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanFilter,
            crate::models::loan::LoanRecord,
            crate::models::loan::BorrowerLoan,
            crate::models::loan::LoanOverview,
            crate::models::loan::CirculationStats,
            // Health
            crate::api::health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "books", description = "Catalog management"),
        (name = "borrow", description = "Borrowing, returns and circulation statistics")
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
