//! End-to-end consumption scenarios wiring the game state machine to the
//! chaos pipeline over an in-memory cluster.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use serpent_chaos::{
    BindingManager, ClusterOps, DeleteDispatcher, QueueSource, StatusLine,
};
use serpent_core::{ResourceKind, ResourceRecord};
use serpent_game::snake::{Coord, Game};
use serpent_game::{ARENA_HEIGHT, ARENA_WIDTH};
use serpent_kubehub::RegistryError;

struct RecordingOps {
    deleted: Mutex<Vec<ResourceRecord>>,
}

impl RecordingOps {
    fn new() -> Self {
        Self { deleted: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl ClusterOps for RecordingOps {
    async fn list(
        &self,
        _kind: ResourceKind,
        _ns: Option<&str>,
        _protect_critical: bool,
    ) -> Result<Vec<ResourceRecord>, RegistryError> {
        Ok(Vec::new())
    }

    async fn delete(&self, record: &ResourceRecord) -> Result<(), RegistryError> {
        self.deleted.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn web_deployment() -> ResourceRecord {
    ResourceRecord {
        kind: ResourceKind::Deployment,
        name: "web".to_string(),
        namespace: Some("default".to_string()),
    }
}

/// One movement step: food is placed right in the snake's path, two ticks
/// later the head occupies its cell.
fn step_onto_food(game: &mut Game) -> serpent_game::snake::TickOutcome {
    game.tick();
    game.tick()
}

#[tokio::test]
async fn eating_bound_food_deletes_exactly_the_bound_resource() {
    let ops = Arc::new(RecordingOps::new());
    let status = StatusLine::new();
    let dispatcher = Arc::new(DeleteDispatcher::new(ops.clone(), status.clone()));

    let (tx, rx) = mpsc::channel(100);
    tx.send(web_deployment()).await.unwrap();
    let manager = BindingManager::new(
        vec![Box::new(QueueSource::new(rx))],
        dispatcher.clone(),
        status.clone(),
    );

    let mut game = Game::new(ARENA_WIDTH, ARENA_HEIGHT);
    let head = game.snake.head();
    let binding = manager.bind().await;
    assert_eq!(binding, Some(web_deployment()));
    game.food.place(Coord { x: head.x + 2, y: head.y }, binding);

    let outcome = step_onto_food(&mut game);
    assert!(outcome.consumed);
    manager.consume(outcome.binding).await;
    dispatcher.drain().await;

    assert_eq!(game.score, 1);
    assert_eq!(ops.deleted.lock().unwrap().clone(), vec![web_deployment()]);
    let msg = status.get();
    assert!(msg.contains("deployment"), "status was: {msg}");
    assert!(msg.contains("web"));
    assert!(msg.contains("default"));
}

#[tokio::test]
async fn eating_unbound_food_scores_without_any_deletion() {
    let ops = Arc::new(RecordingOps::new());
    let status = StatusLine::new();
    let dispatcher = Arc::new(DeleteDispatcher::new(ops.clone(), status.clone()));

    let (_tx, rx) = mpsc::channel::<ResourceRecord>(100);
    let manager = BindingManager::new(
        vec![Box::new(QueueSource::new(rx))],
        dispatcher.clone(),
        status.clone(),
    );

    let mut game = Game::new(ARENA_WIDTH, ARENA_HEIGHT);
    let head = game.snake.head();
    let binding = manager.bind().await;
    assert_eq!(binding, None);
    game.food.place(Coord { x: head.x + 2, y: head.y }, binding);

    let outcome = step_onto_food(&mut game);
    assert!(outcome.consumed);
    assert_eq!(outcome.binding, None);
    manager.consume(outcome.binding).await;
    dispatcher.drain().await;

    assert_eq!(game.score, 1);
    assert!(ops.deleted.lock().unwrap().is_empty());
    assert!(
        status.get().contains("no cluster resource"),
        "status was: {}",
        status.get()
    );
}

#[tokio::test]
async fn consumption_cannot_double_delete() {
    let ops = Arc::new(RecordingOps::new());
    let status = StatusLine::new();
    let dispatcher = Arc::new(DeleteDispatcher::new(ops.clone(), status.clone()));

    let (tx, rx) = mpsc::channel(100);
    tx.send(web_deployment()).await.unwrap();
    let manager = BindingManager::new(
        vec![Box::new(QueueSource::new(rx))],
        dispatcher.clone(),
        status.clone(),
    );

    let mut game = Game::new(ARENA_WIDTH, ARENA_HEIGHT);
    let head = game.snake.head();
    let binding = manager.bind().await;
    game.food.place(Coord { x: head.x + 2, y: head.y }, binding);

    let outcome = step_onto_food(&mut game);
    assert!(outcome.consumed);
    // The binding left the food when it was consumed; re-consuming the
    // same food entity has nothing left to dispatch.
    assert_eq!(game.food.binding, None);
    manager.consume(outcome.binding).await;
    manager.consume(game.food.binding.take()).await;
    dispatcher.drain().await;

    assert_eq!(ops.deleted.lock().unwrap().len(), 1);
}
