//! `/api/tasks` route group.
//!
//! Tasks are kept in memory and scoped to the authenticated owner. Every
//! route answers 401 without an identity in the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::auth::Authenticator;
use crate::http::request::payload;
use crate::http::response::Failure;
use crate::pipeline::RouteContext;
use crate::routing::RouteGroup;

pub const PREFIX: &str = "/api/tasks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
struct NewTask {
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskUpdate {
    title: Option<String>,
    description: Option<String>,
    completed: Option<bool>,
}

/// In-memory task repository.
#[derive(Default)]
pub struct TaskBook {
    next_id: AtomicU64,
    tasks: DashMap<(String, u64), Task>,
}

impl TaskBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, owner: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| entry.key().0 == owner)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    pub fn create(&self, owner: &str, title: String, description: Option<String>) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let task = Task {
            id,
            title,
            description,
            completed: false,
        };
        self.tasks.insert((owner.to_string(), id), task.clone());
        task
    }

    pub fn get(&self, owner: &str, id: u64) -> Option<Task> {
        self.tasks
            .get(&(owner.to_string(), id))
            .map(|entry| entry.value().clone())
    }

    fn update(&self, owner: &str, id: u64, update: TaskUpdate) -> Option<Task> {
        let mut task = self.tasks.get_mut(&(owner.to_string(), id))?;
        if let Some(title) = update.title {
            task.title = title;
        }
        if update.description.is_some() {
            task.description = update.description;
        }
        if let Some(completed) = update.completed {
            task.completed = completed;
        }
        Some(task.clone())
    }

    pub fn remove(&self, owner: &str, id: u64) -> Option<Task> {
        self.tasks
            .remove(&(owner.to_string(), id))
            .map(|(_, task)| task)
    }
}

#[derive(Clone)]
struct TaskRoutes {
    book: Arc<TaskBook>,
    authenticator: Arc<Authenticator>,
}

impl TaskRoutes {
    fn owner(&self, ctx: &RouteContext) -> Result<String, Failure> {
        let identity = self.authenticator.authenticate(ctx)?;
        Ok(format!("{}:{}", identity.provider, identity.subject))
    }

    async fn list(self, ctx: RouteContext) -> Result<Response, Failure> {
        let owner = self.owner(&ctx)?;
        Ok(Json(self.book.list(&owner)).into_response())
    }

    async fn create(self, ctx: RouteContext, request: Request<Body>) -> Result<Response, Failure> {
        let owner = self.owner(&ctx)?;
        let new: NewTask = payload(request).await?;
        if new.title.trim().is_empty() {
            return Err(Failure::bad_request("Title is required"));
        }
        let task = self.book.create(&owner, new.title, new.description);
        tracing::debug!(request_id = %ctx.request_id(), task_id = task.id, "Task created");
        Ok((StatusCode::CREATED, Json(task)).into_response())
    }

    async fn show(self, ctx: RouteContext) -> Result<Response, Failure> {
        let owner = self.owner(&ctx)?;
        let id = task_id(&ctx)?;
        let task = self.book.get(&owner, id).ok_or_else(missing)?;
        Ok(Json(task).into_response())
    }

    async fn update(self, ctx: RouteContext, request: Request<Body>) -> Result<Response, Failure> {
        let owner = self.owner(&ctx)?;
        let id = task_id(&ctx)?;
        let update: TaskUpdate = payload(request).await?;
        let task = self.book.update(&owner, id, update).ok_or_else(missing)?;
        Ok(Json(task).into_response())
    }

    async fn delete(self, ctx: RouteContext) -> Result<Response, Failure> {
        let owner = self.owner(&ctx)?;
        let id = task_id(&ctx)?;
        self.book.remove(&owner, id).ok_or_else(missing)?;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}

fn task_id(ctx: &RouteContext) -> Result<u64, Failure> {
    ctx.param("id")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| Failure::bad_request("Invalid task id"))
}

fn missing() -> Failure {
    Failure::not_found("Task not found")
}

/// CRUD routes over `book`.
pub fn group(book: Arc<TaskBook>, authenticator: Arc<Authenticator>) -> RouteGroup {
    let routes = TaskRoutes {
        book,
        authenticator,
    };
    let (list, create, show, update, delete) = (
        routes.clone(),
        routes.clone(),
        routes.clone(),
        routes.clone(),
        routes,
    );

    RouteGroup::new(PREFIX)
        .get("/", move |ctx, _req| list.clone().list(ctx))
        .post("/", move |ctx, req| create.clone().create(ctx, req))
        .get("/:id", move |ctx, _req| show.clone().show(ctx))
        .put("/:id", move |ctx, req| update.clone().update(ctx, req))
        .delete("/:id", move |ctx, _req| delete.clone().delete(ctx))
}
