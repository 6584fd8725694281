use actix_web::{get, post, web, HttpRequest, HttpResponse};
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::{
    auth::{middleware::claims_from_request, JwtService},
    graphql::Schema,
};

/// Anonymous requests are executed too; resolvers decide what needs claims.
#[post("/graphql")]
async fn graphql(
    schema: web::Data<Schema>,
    jwt_service: web::Data<JwtService>,
    http_request: HttpRequest,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = request.into_inner();
    if let Ok(claims) = claims_from_request(&http_request, &jwt_service) {
        request = request.data(claims);
    }
    schema.execute(request).await.into()
}

#[get("/graphiql")]
async fn graphiql() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(GraphiQLSource::build().endpoint("/graphql").finish())
}
