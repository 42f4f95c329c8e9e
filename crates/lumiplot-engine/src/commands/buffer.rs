use crate::coords::ColorRgba;

use super::Command;

/// Tag selecting which refill handler owns a command buffer.
///
/// Values other than the predefined constants are free for user code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CommandGroup(pub u32);

impl CommandGroup {
    /// Buffers recorded by whole-canvas visuals.
    pub const CANVAS: CommandGroup = CommandGroup(1);
    /// Buffers owned by a panel grid, one per cell.
    pub const PANELS: CommandGroup = CommandGroup(2);
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CommandBufferId(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandBufferState {
    /// Empty, never recorded or just reset.
    Initial,
    Recording,
    /// Closed; ready for replay.
    Executable,
}

/// A recorded command stream owned by the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBuffer {
    id: CommandBufferId,
    group: CommandGroup,
    cmds: Vec<Command>,
    state: CommandBufferState,
    in_pass: bool,
}

impl CommandBuffer {
    pub(crate) fn new(id: CommandBufferId, group: CommandGroup) -> Self {
        Self {
            id,
            group,
            cmds: Vec::new(),
            state: CommandBufferState::Initial,
            in_pass: false,
        }
    }

    #[inline]
    pub fn id(&self) -> CommandBufferId {
        self.id
    }

    #[inline]
    pub fn group(&self) -> CommandGroup {
        self.group
    }

    #[inline]
    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Number of recorded `Draw` commands.
    pub fn draw_count(&self) -> usize {
        self.cmds.iter().filter(|c| matches!(c, Command::Draw { .. })).count()
    }

    /// Drops every recorded command. Keeps allocated capacity for reuse.
    pub fn reset(&mut self) {
        self.cmds.clear();
        self.state = CommandBufferState::Initial;
        self.in_pass = false;
    }

    /// Starts recording. Recording into an executable buffer appends to it.
    pub fn begin(&mut self) {
        if self.state == CommandBufferState::Recording {
            log::warn!("command buffer {:?} is already recording", self.id);
        }
        self.state = CommandBufferState::Recording;
    }

    /// Closes an open render pass and marks the buffer executable.
    pub fn end(&mut self) {
        if self.in_pass {
            self.cmds.push(Command::EndRenderPass);
            self.in_pass = false;
        }
        self.state = CommandBufferState::Executable;
    }

    /// Opens the render pass unless one is already open in this buffer.
    pub fn begin_render_pass_if_needed(&mut self, clear: ColorRgba) {
        if !self.in_pass {
            self.push(Command::BeginRenderPass { clear });
            self.in_pass = true;
        }
    }

    pub fn push(&mut self, cmd: Command) {
        if self.state != CommandBufferState::Recording {
            // Implicit begin, like a one-off recording into a fresh buffer.
            self.begin();
        }
        self.cmds.push(cmd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PipelineKey;

    fn buf() -> CommandBuffer {
        CommandBuffer::new(CommandBufferId(0), CommandGroup::PANELS)
    }

    #[test]
    fn render_pass_opens_once_and_closes_on_end() {
        let mut b = buf();
        b.begin();
        b.begin_render_pass_if_needed(ColorRgba::black());
        b.push(Command::BindPipeline(PipelineKey::Marker));
        b.begin_render_pass_if_needed(ColorRgba::black());
        b.end();

        assert_eq!(b.state(), CommandBufferState::Executable);
        assert_eq!(
            b.commands(),
            &[
                Command::BeginRenderPass { clear: ColorRgba::black() },
                Command::BindPipeline(PipelineKey::Marker),
                Command::EndRenderPass,
            ]
        );
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut b = buf();
        b.push(Command::Draw { vertex_count: 6, instance_count: 3 });
        assert_eq!(b.state(), CommandBufferState::Recording);
        assert_eq!(b.draw_count(), 1);

        b.reset();
        assert!(b.is_empty());
        assert_eq!(b.state(), CommandBufferState::Initial);
    }
}
