//! Input handling for an interactive front end: controllers turn per-frame input state into edits of the
//! values they own and report whether anything changed.

use bitflags::bitflags;

use crate::scene::transform::Transform;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Keys: u32
    {
        const W = 1 << 0;
        const A = 1 << 1;
        const S = 1 << 2;
        const D = 1 << 3;
        const SHIFT = 1 << 4;
        const CTRL = 1 << 5;
    }
}

/// Input state of one frame
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Inputs
{
    pub keys: Keys,
    pub mouse_left: bool,
    pub mouse_right: bool,
    /// Cursor movement since the previous frame, in pixels
    pub mouse_delta: glam::Vec2,
    /// Seconds
    pub delta_time: f32,
    /// Set when an overlay consumes the mouse this frame
    pub ui_captures_mouse: bool,
}

impl Inputs
{
    /// Shift doubles, ctrl halves
    fn strength(&self, base: f32) -> f32
    {
        let mut strength: f32 = base;
        if self.keys.contains(Keys::SHIFT)
        {
            strength *= 2.0;
        }
        if self.keys.contains(Keys::CTRL)
        {
            strength /= 2.0;
        }
        strength
    }
}

/// Fly camera: WASD moves in the view plane, left drag turns, right drag rolls
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CameraController
{
    pub transform: Transform,
}

impl CameraController
{
    const TURN_SPEED: f32 = 1.0;
    const ROLL_SPEED: f32 = 10.0;
    const MOVE_SPEED: f32 = 2.0;

    pub fn new(transform: Transform) -> Self { Self { transform } }

    pub fn update(&mut self, inputs: &Inputs) -> bool
    {
        if inputs.ui_captures_mouse
        {
            return false;
        }

        let mut changed: bool = false;

        if inputs.mouse_left
        {
            let turn: f32 = inputs.strength(Self::TURN_SPEED) * inputs.delta_time;
            self.transform
                .rotate_euler(glam::Vec3::new(-inputs.mouse_delta.y, -inputs.mouse_delta.x, 0.0) * turn);
            changed = true;
        }

        if inputs.mouse_right
        {
            let roll: f32 = inputs.strength(Self::ROLL_SPEED) * inputs.delta_time;
            self.transform.rotate_euler(glam::Vec3::new(0.0, 0.0, -inputs.mouse_delta.x * roll));
            changed = true;
        }

        let mut translation: glam::Vec3 = glam::Vec3::ZERO;
        for (key, direction) in [
            (Keys::W, Transform::FRONT),
            (Keys::A, -Transform::RIGHT),
            (Keys::S, -Transform::FRONT),
            (Keys::D, Transform::RIGHT),
        ]
        {
            if inputs.keys.contains(key)
            {
                translation += direction;
            }
        }

        //Opposite keys cancel out
        if let Some(direction) = (self.transform.rotation * translation).try_normalize()
        {
            self.transform
                .translate(direction * inputs.strength(Self::MOVE_SPEED) * inputs.delta_time);
            changed = true;
        }

        changed
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Controller
{
    Camera(CameraController),
    List(ControllerList),
}

impl Controller
{
    pub fn update(&mut self, inputs: &Inputs) -> bool
    {
        match self
        {
            Controller::Camera(camera) => camera.update(inputs),
            Controller::List(list) => list.update(inputs),
        }
    }
}

/// Updates every member, reports whether any of them changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControllerList
{
    controllers: Vec<Controller>,
}

impl ControllerList
{
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, controller: Controller) -> &mut Controller
    {
        self.controllers.push(controller);
        let last: usize = self.controllers.len() - 1;
        &mut self.controllers[last]
    }

    pub fn controllers(&self) -> &[Controller] { &self.controllers }

    pub fn len(&self) -> usize { self.controllers.len() }

    pub fn is_empty(&self) -> bool { self.controllers.is_empty() }

    pub fn update(&mut self, inputs: &Inputs) -> bool
    {
        //No short circuit, every member sees the inputs
        self.controllers
            .iter_mut()
            .fold(false, |changed, controller| controller.update(inputs) | changed)
    }
}
