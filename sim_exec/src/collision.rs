//! # Collision module
//!
//! Collision detection and response between the circular robot footprint,
//! the wall cells of the maze, and the edges of the arena.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

use crate::{
    maze::{CellKind, Maze},
    robot::Robot,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Extra distance added around the robot when selecting cells to test.
///
/// Units: meters
pub const CELL_SEARCH_MARGIN_M: f64 = 0.01;

/// Default number of push-out iterations per resolution.
pub const DEFAULT_RESOLVE_ITERATIONS: usize = 3;

/// Velocity scaling applied after any collision was resolved.
pub const COLLISION_DAMPING: f64 = 0.5;

/// Probe distances used when searching for a free position.
///
/// Units: meters
const SEARCH_RADII_M: [f64; 7] = [0.05, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0];

/// Number of probe directions around each search radius.
const SEARCH_DIRECTIONS: usize = 8;

/// Distance from an arena edge within which the robot counts as touching it.
///
/// Units: meters
const EDGE_TOLERANCE_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An axis aligned rectangle, given by its lower left corner and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point2<f64>,
    pub size: Vector2<f64>,
}

/// Result of testing a circle against the maze.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionCheck {
    /// True if the circle overlaps any wall or arena edge.
    pub collides: bool,

    /// Sum of the displacements needed to clear every overlap.
    pub push: Vector2<f64>,
}

/// Collision handler for a single maze.
#[derive(Debug, Clone)]
pub struct CollisionHandler {
    maze: Maze,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            min: Point2::new(x, y),
            size: Vector2::new(width, height),
        }
    }

    pub fn max(&self) -> Point2<f64> {
        self.min + self.size
    }
}

impl CollisionHandler {
    pub fn new(maze: Maze) -> Self {
        Self { maze }
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    /// Test a circle against every wall cell near it and against the arena
    /// edges.
    pub fn check_collision(&self, centre: &Point2<f64>, radius: f64) -> CollisionCheck {
        let cs = self.maze.cell_size();
        let margin = radius + CELL_SEARCH_MARGIN_M;
        let max_col = self.maze.width_cells() as i64 - 1;
        let max_row = self.maze.height_cells() as i64 - 1;

        // Range of cells under the expanded bounding box, clamped to the grid
        let (min_cx, min_cy) = self.maze.cell_index(centre.x - margin, centre.y - margin);
        let (max_cx, max_cy) = self.maze.cell_index(centre.x + margin, centre.y + margin);
        let (min_cx, min_cy) = (min_cx.max(0), min_cy.max(0));
        let (max_cx, max_cy) = (max_cx.min(max_col), max_cy.min(max_row));

        let mut check = CollisionCheck {
            collides: false,
            push: Vector2::zeros(),
        };

        for row in min_cy..=max_cy {
            for col in min_cx..=max_cx {
                if self.maze.cell(col, row) != CellKind::Wall {
                    continue;
                }

                let rect = Rect::new(col as f64 * cs, row as f64 * cs, cs, cs);
                if let Some(push) = circle_rect_collision(centre, radius, &rect) {
                    check.collides = true;
                    check.push += push;
                }
            }
        }

        // Arena edges
        let (width, height) = self.maze.dimensions();

        if centre.x - radius < 0.0 {
            check.collides = true;
            check.push.x += radius - centre.x;
        }
        if centre.x + radius > width {
            check.collides = true;
            check.push.x -= (centre.x + radius) - width;
        }
        if centre.y - radius < 0.0 {
            check.collides = true;
            check.push.y += radius - centre.y;
        }
        if centre.y + radius > height {
            check.collides = true;
            check.push.y -= (centre.y + radius) - height;
        }

        check
    }

    /// Push the robot out of any walls.
    ///
    /// The summed push is applied up to `iterations` times, stopping as soon
    /// as the robot is clear. If any push was applied the robot's linear
    /// velocity is halved. Returns true if a collision was resolved.
    pub fn resolve_collision(&self, robot: &mut Robot, iterations: usize) -> bool {
        let radius = robot.radius();
        let mut position = robot.position_m;
        let mut resolved = false;

        for _ in 0..iterations {
            let check = self.check_collision(&position, radius);

            if !check.collides {
                break;
            }

            resolved = true;
            position += check.push;
        }

        if resolved {
            trace!(
                "Collision resolved, robot moved from ({:.4}, {:.4}) to ({:.4}, {:.4})",
                robot.position_m.x,
                robot.position_m.y,
                position.x,
                position.y
            );

            robot.position_m = position;
            robot.velocity_ms *= COLLISION_DAMPING;
        }

        resolved
    }

    /// Find the nearest collision-free position to the given point.
    ///
    /// The point itself is returned if it is clear, otherwise points are
    /// probed in eight directions at increasing distances up to
    /// `search_radius`. Returns `None` if no probe is clear.
    pub fn find_valid_position(
        &self,
        centre: &Point2<f64>,
        radius: f64,
        search_radius: f64,
    ) -> Option<Point2<f64>> {
        if !self.check_collision(centre, radius).collides {
            return Some(*centre);
        }

        for r in SEARCH_RADII_M.iter().take_while(|r| **r <= search_radius) {
            for i in 0..SEARCH_DIRECTIONS {
                let angle = i as f64 * 2.0 * PI / SEARCH_DIRECTIONS as f64;
                let probe = centre + Vector2::new(angle.cos(), angle.sin()) * *r;

                if !self.check_collision(&probe, radius).collides {
                    return Some(probe);
                }
            }
        }

        None
    }

    /// Keep the robot inside the arena.
    ///
    /// Any axis on which the body touches or pokes out of an edge is snapped
    /// back to the edge and its velocity component into the edge is removed.
    /// Returns true if the position or velocity was changed.
    pub fn clamp_to_arena(&self, robot: &mut Robot) -> bool {
        let r = robot.radius();
        let (width, height) = self.maze.dimensions();

        let clamped_x = clamp_axis(&mut robot.position_m.x, &mut robot.velocity_ms.x, r, width);
        let clamped_y = clamp_axis(&mut robot.position_m.y, &mut robot.velocity_ms.y, r, height);

        clamped_x || clamped_y
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Test a circle against an axis aligned rectangle.
///
/// Returns the displacement which moves the circle out of the rectangle, or
/// `None` if they don't overlap. If the centre lies inside the rectangle the
/// circle is pushed out through the nearest edge, ties going to the left,
/// right, bottom and top edges in that order.
pub fn circle_rect_collision(
    centre: &Point2<f64>,
    radius: f64,
    rect: &Rect,
) -> Option<Vector2<f64>> {
    let max = rect.max();

    // Closest point of the rectangle to the centre
    let closest = Point2::new(
        centre.x.max(rect.min.x).min(max.x),
        centre.y.max(rect.min.y).min(max.y),
    );

    let delta = centre - closest;
    let distance_sq = delta.norm_squared();

    if distance_sq >= radius * radius {
        return None;
    }

    if distance_sq > 0.0 {
        let distance = distance_sq.sqrt();
        return Some(delta / distance * (radius - distance));
    }

    // Centre inside the rectangle
    let to_left = centre.x - rect.min.x;
    let to_right = max.x - centre.x;
    let to_bottom = centre.y - rect.min.y;
    let to_top = max.y - centre.y;

    let nearest = to_left.min(to_right).min(to_bottom).min(to_top);

    let push = if nearest == to_left {
        Vector2::new(-(radius + to_left), 0.0)
    } else if nearest == to_right {
        Vector2::new(radius + to_right, 0.0)
    } else if nearest == to_bottom {
        Vector2::new(0.0, -(radius + to_bottom))
    } else {
        Vector2::new(0.0, radius + to_top)
    };

    Some(push)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp one axis of the robot to `[r, extent - r]`.
///
/// A body resting on an edge, within [`EDGE_TOLERANCE_M`], counts as
/// touching it so that velocity into the edge is always removed.
fn clamp_axis(pos: &mut f64, vel: &mut f64, r: f64, extent: f64) -> bool {
    let mut clamped = false;

    if *pos - r <= EDGE_TOLERANCE_M {
        if *pos < r {
            *pos = r;
            clamped = true;
        }
        if *vel < 0.0 {
            *vel = 0.0;
            clamped = true;
        }
    } else if *pos + r >= extent - EDGE_TOLERANCE_M {
        if *pos > extent - r {
            *pos = extent - r;
            clamped = true;
        }
        if *vel > 0.0 {
            *vel = 0.0;
            clamped = true;
        }
    }

    clamped
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::robot::{MotorNoiseParams, RobotParams, StartPose};
    use approx::assert_abs_diff_eq;
    use comms_if::eqpt::motor::WheelId;
    use rstest::rstest;

    const RADIUS: f64 = 0.075;

    fn robot_at(x: f64, y: f64) -> Robot {
        Robot::new(
            RobotParams::default(),
            &MotorNoiseParams::default(),
            StartPose {
                position_m: Point2::new(x, y),
                heading_rad: 0.0,
            },
        )
        .unwrap()
    }

    /// A 2 m x 2 m open arena.
    fn open_arena() -> CollisionHandler {
        CollisionHandler::new(
            Maze::from_ascii("open", 0.5, &["....", "....", "....", "...."]).unwrap(),
        )
    }

    #[test]
    fn test_circle_rect_clear() {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);

        assert!(circle_rect_collision(&Point2::new(1.2, 0.5), 0.1, &rect).is_none());
        assert!(circle_rect_collision(&Point2::new(1.1, 0.5), 0.1, &rect).is_none());
    }

    #[test]
    fn test_circle_rect_edge_overlap() {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);

        let push = circle_rect_collision(&Point2::new(1.05, 0.5), 0.1, &rect).unwrap();
        assert_abs_diff_eq!(push.x, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(push.y, 0.0);

        // Corner overlap pushes diagonally
        let push = circle_rect_collision(&Point2::new(1.05, 1.05), 0.1, &rect).unwrap();
        assert_abs_diff_eq!(push.x, push.y, epsilon = 1e-12);
        assert_abs_diff_eq!(push.norm(), 0.1 - 0.05 * 2f64.sqrt(), epsilon = 1e-12);
    }

    #[rstest]
    #[case(Point2::new(0.1, 0.5), Vector2::new(-0.2, 0.0))]
    #[case(Point2::new(0.9, 0.5), Vector2::new(0.2, 0.0))]
    #[case(Point2::new(0.5, 0.1), Vector2::new(0.0, -0.2))]
    #[case(Point2::new(0.5, 0.9), Vector2::new(0.0, 0.2))]
    #[case(Point2::new(0.5, 0.5), Vector2::new(-0.6, 0.0))]
    #[case(Point2::new(0.9, 0.9), Vector2::new(0.2, 0.0))]
    fn test_circle_rect_inside(#[case] centre: Point2<f64>, #[case] expected: Vector2<f64>) {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);

        let push = circle_rect_collision(&centre, 0.1, &rect).unwrap();
        assert_abs_diff_eq!(push.x, expected.x, epsilon = 1e-12);
        assert_abs_diff_eq!(push.y, expected.y, epsilon = 1e-12);
    }

    #[test]
    fn test_open_arena_centre_clear() {
        let handler = open_arena();

        let check = handler.check_collision(&Point2::new(1.0, 1.0), RADIUS);
        assert!(!check.collides);
        assert_eq!(check.push, Vector2::zeros());
    }

    #[test]
    fn test_arena_edges_push_inside() {
        let handler = open_arena();

        let check = handler.check_collision(&Point2::new(0.05, 1.0), RADIUS);
        assert!(check.collides);
        assert_abs_diff_eq!(check.push.x, 0.025, epsilon = 1e-12);

        let check = handler.check_collision(&Point2::new(1.0, 1.97), RADIUS);
        assert!(check.collides);
        assert_abs_diff_eq!(check.push.y, -0.045, epsilon = 1e-12);
    }

    #[test]
    fn test_wall_pushes_are_summed() {
        // Wall cells to the left and right of a narrow gap
        let handler = CollisionHandler::new(
            Maze::from_ascii("gap", 0.1, &["#.#", "#.#", "#.#"]).unwrap(),
        );

        let check = handler.check_collision(&Point2::new(0.15, 0.15), 0.06);
        assert!(check.collides);
        assert_abs_diff_eq!(check.push.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_resolve_single_wall() {
        // Single wall cell in the middle of an open arena
        let handler = CollisionHandler::new(
            Maze::from_ascii("pillar", 0.2, &[".....", ".....", "..#..", ".....", "....."])
                .unwrap(),
        );
        let mut robot = robot_at(0.41, 0.5);
        robot.velocity_ms = Vector2::new(0.2, -0.1);

        assert!(handler.check_collision(&robot.position_m, RADIUS).collides);
        assert!(handler.resolve_collision(&mut robot, DEFAULT_RESOLVE_ITERATIONS));
        assert!(!handler.check_collision(&robot.position_m, RADIUS).collides);

        // Pushed out of the left face and velocity halved
        assert_abs_diff_eq!(robot.position_m.x, 0.4 - RADIUS, epsilon = 1e-12);
        assert_abs_diff_eq!(robot.position_m.y, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(robot.velocity_ms.x, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(robot.velocity_ms.y, -0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_resolve_corridor() {
        // Horizontal corridor one cell high between two walls
        let handler = CollisionHandler::new(
            Maze::from_ascii(
                "corridor",
                0.2,
                &["######", "......", "######"],
            )
            .unwrap(),
        );

        // Centre inside the bottom wall
        let mut robot = robot_at(0.5, 0.19);
        assert!(handler.resolve_collision(&mut robot, DEFAULT_RESOLVE_ITERATIONS));
        assert!(!handler.check_collision(&robot.position_m, RADIUS).collides);
        assert!(robot.position_m.y > 0.2 && robot.position_m.y < 0.4);

        // Overlapping the top wall
        let mut robot = robot_at(0.5, 0.35);
        assert!(handler.resolve_collision(&mut robot, DEFAULT_RESOLVE_ITERATIONS));
        assert!(!handler.check_collision(&robot.position_m, RADIUS).collides);
        assert_abs_diff_eq!(robot.position_m.y, 0.4 - RADIUS, epsilon = 1e-12);
    }

    #[test]
    fn test_resolve_clear_is_noop() {
        let handler = open_arena();
        let mut robot = robot_at(1.0, 1.0);
        robot.velocity_ms = Vector2::new(0.3, 0.3);

        assert!(!handler.resolve_collision(&mut robot, DEFAULT_RESOLVE_ITERATIONS));
        assert_eq!(robot.position_m, Point2::new(1.0, 1.0));
        assert_eq!(robot.velocity_ms, Vector2::new(0.3, 0.3));
    }

    #[test]
    fn test_find_valid_position() {
        let handler = CollisionHandler::new(Maze::default());

        // Clear point returned unchanged
        let p = Point2::new(1.0, 1.0);
        assert_eq!(handler.find_valid_position(&p, RADIUS, 1.0), Some(p));

        // Inside the left wall, the first clear probe is to the east
        let p = Point2::new(0.19, 1.0);
        let found = handler.find_valid_position(&p, RADIUS, 1.0).unwrap();
        assert!(!handler.check_collision(&found, RADIUS).collides);
        assert_abs_diff_eq!(found.y, 1.0, epsilon = 1e-12);
        assert!(found.x > p.x);

        // Nothing clear when the search radius is too small
        assert_eq!(handler.find_valid_position(&p, RADIUS, 0.01), None);
    }

    #[test]
    fn test_find_valid_position_none() {
        let handler = CollisionHandler::new(
            Maze::from_ascii("solid", 0.2, &["###", "###", "###"]).unwrap(),
        );

        assert_eq!(
            handler.find_valid_position(&Point2::new(0.3, 0.3), RADIUS, 1.0),
            None
        );
    }

    #[test]
    fn test_clamp_to_arena() {
        let handler = open_arena();

        let mut robot = robot_at(0.02, 1.0);
        robot.velocity_ms = Vector2::new(-0.4, 0.1);
        assert!(handler.clamp_to_arena(&mut robot));
        assert_eq!(robot.position_m.x, RADIUS);
        assert_eq!(robot.velocity_ms.x, 0.0);
        assert_eq!(robot.velocity_ms.y, 0.1);

        let mut robot = robot_at(1.99, 1.99);
        robot.velocity_ms = Vector2::new(0.4, -0.1);
        assert!(handler.clamp_to_arena(&mut robot));
        assert_eq!(robot.position_m, Point2::new(2.0 - RADIUS, 2.0 - RADIUS));
        assert_eq!(robot.velocity_ms, Vector2::new(0.0, -0.1));

        let mut robot = robot_at(1.0, 1.0);
        assert!(!handler.clamp_to_arena(&mut robot));
    }

    #[test]
    fn test_clamp_robot_resting_on_edge() {
        let handler = open_arena();

        // Already on the west edge but still moving into it
        let mut robot = robot_at(RADIUS, 1.0);
        robot.velocity_ms = Vector2::new(-0.25, 0.0);
        assert!(handler.clamp_to_arena(&mut robot));
        assert_eq!(robot.position_m.x, RADIUS);
        assert_eq!(robot.velocity_ms.x, 0.0);

        // On the north edge moving into it, within rounding of the edge
        let mut robot = robot_at(1.0, 2.0 - RADIUS + 1e-12);
        robot.velocity_ms = Vector2::new(0.1, 0.3);
        assert!(handler.clamp_to_arena(&mut robot));
        assert_eq!(robot.position_m.y, 2.0 - RADIUS);
        assert_eq!(robot.velocity_ms, Vector2::new(0.1, 0.0));

        // Resting on the edge and moving away is left alone
        let mut robot = robot_at(RADIUS, 1.0);
        robot.velocity_ms = Vector2::new(0.2, 0.0);
        assert!(!handler.clamp_to_arena(&mut robot));
        assert_eq!(robot.velocity_ms.x, 0.2);
    }

    #[test]
    fn test_pinned_against_edge_has_no_velocity_into_it() {
        let handler = open_arena();
        let mut robot = robot_at(0.2, 1.0);
        robot.set_wheel_target(WheelId::North, -1.0);
        robot.set_wheel_target(WheelId::South, 1.0);

        let mut steps_at_edge = 0;
        for _ in 0..400 {
            robot.step(0.01);
            handler.resolve_collision(&mut robot, DEFAULT_RESOLVE_ITERATIONS);
            handler.clamp_to_arena(&mut robot);

            assert!(robot.position_m.x >= RADIUS);
            if robot.position_m.x - RADIUS <= 1e-9 {
                assert!(robot.velocity_ms.x >= 0.0);
                steps_at_edge += 1;
            }
        }

        assert!(steps_at_edge > 100);
        assert_abs_diff_eq!(robot.position_m.x, RADIUS, epsilon = 1e-9);
    }
}
