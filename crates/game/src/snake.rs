//! Snake, food, and arena state machine. Pure and deterministic; the
//! terminal front end and the chaos pipeline hang off the outcomes.

use rand::Rng;

use serpent_core::ResourceRecord;

pub const ARENA_WIDTH: i32 = 80;
pub const ARENA_HEIGHT: i32 = 24;

/// Movement applies every second tick so input stays responsive at the
/// rendering rate while the snake moves at half of it.
const MOVE_EVERY: u8 = 2;

const INITIAL_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn reverse(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Turn(Direction),
    TogglePause,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Paused,
    GameOver,
}

#[derive(Debug)]
pub struct Snake {
    body: Vec<Coord>,
    direction: Direction,
    tick_count: u8,
    growth: u32,
}

impl Snake {
    /// Three segments heading right, spaced two columns apart to match the
    /// horizontal step size.
    pub fn new(x: i32, y: i32) -> Self {
        let body = (0..INITIAL_LENGTH as i32).map(|i| Coord { x: x - i * 2, y }).collect();
        Self { body, direction: Direction::Right, tick_count: 0, growth: 0 }
    }

    pub fn head(&self) -> Coord {
        self.body[0]
    }

    pub fn segments(&self) -> &[Coord] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    fn bites_itself(&self) -> bool {
        let head = self.head();
        self.body[1..].iter().any(|seg| *seg == head)
    }
}

/// Food spawns unplaced, gets a position and (optionally) a binding, and is
/// re-armed to unplaced the moment it is consumed.
#[derive(Debug, Default)]
pub struct Food {
    pub pos: Option<Coord>,
    pub binding: Option<ResourceRecord>,
}

impl Food {
    pub fn placed(&self) -> bool {
        self.pos.is_some()
    }

    pub fn place(&mut self, pos: Coord, binding: Option<ResourceRecord>) {
        self.pos = Some(pos);
        self.binding = binding;
    }

    /// Horizontal tolerance of one cell offsets the two-cell horizontal
    /// step; vertical matches exactly.
    pub fn at_position(&self, c: Coord) -> bool {
        match self.pos {
            Some(f) => (c.x - f.x).abs() <= 1 && c.y == f.y,
            None => false,
        }
    }
}

/// Position inside the arena interior, clear of the walls by one extra
/// cell so the food glyph never touches the border.
pub fn random_food_position<R: Rng>(rng: &mut R, width: i32, height: i32) -> Coord {
    Coord { x: rng.gen_range(2..width - 2), y: rng.gen_range(2..height - 2) }
}

/// What a tick produced. Consumption and game-over can coincide; a food
/// eaten on a fatal move still counts.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub consumed: bool,
    /// Binding the consumed food carried, already cleared from the food.
    pub binding: Option<ResourceRecord>,
    pub game_over: bool,
}

#[derive(Debug)]
pub struct Game {
    pub snake: Snake,
    pub food: Food,
    pub score: u32,
    pub phase: Phase,
    pub width: i32,
    pub height: i32,
}

impl Game {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            snake: Snake::new(width / 4, height / 2),
            food: Food::default(),
            score: 0,
            phase: Phase::Running,
            width,
            height,
        }
    }

    /// While paused only the pause toggle is honored; after game over,
    /// nothing is. A turn into the direct reverse is ignored so the snake
    /// cannot fold onto its own neck.
    pub fn handle_input(&mut self, input: Input) {
        if self.phase == Phase::GameOver {
            return;
        }
        match input {
            Input::TogglePause => {
                self.phase = match self.phase {
                    Phase::Running => Phase::Paused,
                    Phase::Paused => Phase::Running,
                    Phase::GameOver => Phase::GameOver,
                };
                tracing::info!(paused = (self.phase == Phase::Paused), "pause toggled");
            }
            Input::Turn(dir) if self.phase == Phase::Running => {
                if dir != self.snake.direction.reverse() {
                    self.snake.direction = dir;
                }
            }
            _ => {}
        }
    }

    /// Advance one tick. Physics only runs in `Running` and only on every
    /// `MOVE_EVERY`-th call; horizontal moves advance two cells to
    /// compensate for non-square terminal cells.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.phase != Phase::Running {
            return outcome;
        }
        self.snake.tick_count += 1;
        if self.snake.tick_count < MOVE_EVERY {
            return outcome;
        }
        self.snake.tick_count = 0;

        let mut head = self.snake.head();
        match self.snake.direction {
            Direction::Right => head.x += 2,
            Direction::Left => head.x -= 2,
            Direction::Up => head.y -= 1,
            Direction::Down => head.y += 1,
        }

        if self.food.at_position(head) {
            self.snake.growth += 1;
            self.score += 1;
            // Binding leaves the food exactly once, before the caller can
            // dispatch any deletion.
            outcome.consumed = true;
            outcome.binding = self.food.binding.take();
            self.food.pos = None;
        }

        if self.snake.growth > 0 {
            self.snake.body.insert(0, head);
            self.snake.growth -= 1;
        } else {
            self.snake.body.insert(0, head);
            self.snake.body.pop();
        }

        if self.hits_wall(head) || self.snake.bites_itself() {
            self.phase = Phase::GameOver;
            outcome.game_over = true;
        }
        outcome
    }

    fn hits_wall(&self, head: Coord) -> bool {
        head.x < 1 || head.y < 1 || head.x >= self.width - 1 || head.y >= self.height - 1
    }
}
