use axum::{extract::State, Json};
use common_http_errors::ApiError;

use crate::store::{Collection, Document, Filter};
use crate::AppState;

pub async fn list_menu(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    let menu = state.store.find(Collection::Menu, &Filter::All).await?;
    Ok(Json(menu))
}

pub async fn list_reviews(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    let reviews = state.store.find(Collection::Reviews, &Filter::All).await?;
    Ok(Json(reviews))
}
