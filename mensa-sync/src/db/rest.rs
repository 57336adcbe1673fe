//! Hosted dish store over a PostgREST-compatible API
//!
//! Table rows are addressed as `<base_url>/rest/v1/gerichte` with equality
//! filters in the query string (`name=eq.Chili`). Every request carries the
//! project key both as `apikey` header and as bearer token.

use async_trait::async_trait;
use mensa_common::db::{Dish, DishChanges, DishMetadata, NewDish, DISHES_TABLE};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;

use super::{DishStore, StoreError};

use crate::services::USER_AGENT;

/// Dish store backed by a hosted REST table
pub struct RestDishStore {
    http_client: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl RestDishStore {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            table_url: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), DISHES_TABLE),
            api_key,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn select(&self, filters: &[(&str, String)]) -> Result<Vec<Dish>, StoreError> {
        let request = self
            .http_client
            .get(&self.table_url)
            .query(&[("select", "*")])
            .query(filters);

        let response = send(self.authorized(request)).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn patch<T: Serialize + Sync>(&self, id: i64, body: &T) -> Result<(), StoreError> {
        let request = self
            .http_client
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(body);

        let response = send(self.authorized(request)).await?;
        let rows: Vec<Dish> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(StoreError::Status(status.as_u16(), error_text));
    }

    Ok(response)
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl DishStore for RestDishStore {
    async fn find_by_name_and_date(&self, name: &str, date: &str) -> Result<Option<Dish>, StoreError> {
        let rows = self
            .select(&[
                ("name", eq(name)),
                ("datum", eq(date)),
                ("limit", "1".to_string()),
            ])
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn insert(&self, dish: &NewDish) -> Result<Dish, StoreError> {
        let request = self
            .http_client
            .post(&self.table_url)
            .header("Prefer", "return=representation")
            .json(dish);

        let response = send(self.authorized(request)).await?;
        let rows: Vec<Dish> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))
    }

    async fn update_sync_fields(&self, id: i64, changes: &DishChanges) -> Result<(), StoreError> {
        self.patch(id, changes).await
    }

    async fn list_pending(&self) -> Result<Vec<Dish>, StoreError> {
        self.select(&[
            ("meta_generiert", eq(false)),
            ("order", "id.asc".to_string()),
        ])
        .await
    }

    async fn store_metadata(&self, id: i64, metadata: &DishMetadata) -> Result<(), StoreError> {
        self.patch(id, metadata).await
    }

    async fn list_by_date(&self, date: &str) -> Result<Vec<Dish>, StoreError> {
        self.select(&[("datum", eq(date)), ("order", "id.asc".to_string())])
            .await
    }
}
