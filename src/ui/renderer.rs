/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Every board cell is two terminal columns wide so the grid looks square.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::board::Board;
use crate::domain::tile::EntityKind;
use crate::sim::session::{GameSession, Outcome, SessionState};
use crate::sim::world::{Phase, WorldState, TITLE_ITEMS};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit background for every empty terminal cell, so gaps between
    /// rows match the cells on terminals that paint them separately.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from any real cell, so every position gets diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    /// Write a string horizontally centered on row y.
    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        self.put_str(self.width.saturating_sub(len) / 2, y, s, fg, bg);
    }
}

// ── Palette ──

const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const DIM: Color = Color::DarkGrey;
const HI: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const CURSOR_BG: Color = Color::Rgb { r: 30, g: 60, b: 30 };
const FLOOR_BG: Color = Color::Rgb { r: 40, g: 36, b: 30 };
const WALL_FG: Color = Color::Rgb { r: 150, g: 90, b: 60 };
const TARGET_FG: Color = Color::Rgb { r: 255, g: 90, b: 90 };
const BOX_FG: Color = Color::Rgb { r: 230, g: 170, b: 60 };
const PLAYER_FG: Color = Color::Rgb { r: 120, g: 200, b: 255 };

const CELL_W: usize = 2;
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

/// Glyph pair, foreground and background for the topmost entity of a cell.
fn glyph(kind: Option<EntityKind>, on_target: bool) -> ([char; 2], Color, Color) {
    match kind {
        Some(EntityKind::Wall) => (['▓', '▓'], WALL_FG, Color::Reset),
        Some(EntityKind::Floor) => ([' ', ' '], Color::Reset, FLOOR_BG),
        Some(EntityKind::WinArea) => (['(', ')'], TARGET_FG, FLOOR_BG),
        Some(EntityKind::Box) if on_target => (['[', ']'], HI, FLOOR_BG),
        Some(EntityKind::Box) => (['[', ']'], BOX_FG, FLOOR_BG),
        Some(EntityKind::Player) => (['<', '>'], PLAYER_FG, FLOOR_BG),
        None => ([' ', ' '], Color::Reset, Color::Reset),
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        self.sync_size()?;
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Pick up terminal resizes; force a full repaint when the size changed.
    fn sync_size(&mut self) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }
        Ok(())
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        self.sync_size()?;

        // Phase change → clear for a clean transition
        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.front.clear();
        match world.phase {
            Phase::Title => self.compose_title(world),
            Phase::LevelSelect => self.compose_level_select(world),
            Phase::Playing => self.compose_game(world),
            Phase::NameEntry => {
                self.compose_game(world);
                self.compose_name_entry(world);
            }
            Phase::Highscores => self.compose_highscores(world),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_title(&mut self, w: &WorldState) {
        let top = self.front.height.saturating_sub(TITLE_ITEMS.len() + 8) / 2;
        self.front.put_centered(top, "╔══════════════════════════╗", GOLD, Color::Reset);
        self.front.put_centered(top + 1, "║     S O K O B A N        ║", GOLD, Color::Reset);
        self.front.put_centered(top + 2, "╚══════════════════════════╝", GOLD, Color::Reset);

        for (i, item) in TITLE_ITEMS.iter().enumerate() {
            let row = top + 4 + i;
            if i == w.title_cursor {
                let blink = (w.anim_tick / 6) % 2 == 0;
                let label = format!("{} {:<18}", if blink { '▸' } else { ' ' }, item);
                self.front.put_centered(row, &label, HI, CURSOR_BG);
            } else {
                self.front.put_centered(row, &format!("  {:<18}", item), Color::White, Color::Reset);
            }
        }

        let foot = top + 5 + TITLE_ITEMS.len();
        self.front.put_centered(foot, &w.message, GOLD, Color::Reset);
        self.front.put_centered(foot + 1, "↑↓: Select   ENTER: OK   Q: Quit", DIM, Color::Reset);
    }

    fn compose_level_select(&mut self, w: &WorldState) {
        self.front.put_str(2, 1, "╔═══════════════════════════════════════════╗", GOLD, Color::Reset);
        self.front.put_str(2, 2, "║              LEVEL  SELECT                ║", GOLD, Color::Reset);
        self.front.put_str(2, 3, "╚═══════════════════════════════════════════╝", GOLD, Color::Reset);

        let list_top = 5;
        let visible = 16_usize.min(self.front.height.saturating_sub(list_top + 4)).max(1);
        let total = w.catalog.len();
        let scroll = w.select_cursor.saturating_sub(visible - 1);

        if scroll > 0 {
            self.front.put_str(2, list_top - 1, "    ▲ ▲ ▲", DIM, Color::Reset);
        }

        for (i, entry) in w.catalog.iter().enumerate().skip(scroll).take(visible) {
            let row = list_top + i - scroll;
            let name: String = entry.name.chars().take(36).collect();
            let label = format!("{:>3}. {:<36}", i + 1, name);
            if i == w.select_cursor {
                for x in 0..48.min(self.front.width) {
                    self.front.set(x, row, Cell::new(' ', Color::White, CURSOR_BG));
                }
                self.front.put_str(2, row, "▸", HI, CURSOR_BG);
                self.front.put_str(3, row, &label, HI, CURSOR_BG);
            } else {
                self.front.put_str(3, row, &label, Color::White, Color::Reset);
            }
        }

        if scroll + visible < total {
            self.front.put_str(2, list_top + visible, "    ▼ ▼ ▼", DIM, Color::Reset);
        }

        let footer_row = list_top + visible + 2;
        self.front.put_str(2, footer_row, &w.message, GOLD, Color::Reset);
        self.front.put_str(2, footer_row + 1, "  ENTER: Start   ↑↓: Select   PgUp/PgDn   ESC: Back", DIM, Color::Reset);
        if total > 0 {
            let count = format!("  {}/{} levels", w.select_cursor + 1, total);
            self.front.put_str(2, footer_row + 2, &count, DIM, Color::Reset);
        }
    }

    fn compose_game(&mut self, w: &WorldState) {
        let s = match &w.session {
            Some(s) => s,
            None => return,
        };
        let board = s.board();

        // ── HUD ──
        let boxes = board.count(EntityKind::Box);
        let hud = format!(
            " {}   Time: {:>5.1}s   Moves: {}   Pushes: {}   Boxes: {}/{} ",
            s.level_name(), s.time_remaining(), s.moves(), s.pushes(),
            board.boxes_on_target(), boxes,
        );
        let hud_fg = if s.time_remaining() < 10.0 && !s.is_ended() { TARGET_FG } else { Color::White };
        self.front.put_str(0, HUD_ROW, &hud, hud_fg, Color::Reset);
        if let Some(best) = w.highscores.best_time(s.map_info()) {
            self.front.put_str(1, HUD_ROW + 1, &format!("Best: {best:.1}s"), DIM, Color::Reset);
        }

        // ── Board, centered ──
        let left = self.front.width.saturating_sub(board.width() * CELL_W) / 2;
        self.compose_board(board, left, MAP_ROW);

        // ── Status + help ──
        let status_row = MAP_ROW + board.height() + 1;
        self.front.put_centered(status_row, &status_line(s, &w.message), GOLD, Color::Reset);
        self.front.put_centered(status_row + 1, &help_line(s), DIM, Color::Reset);
    }

    fn compose_board(&mut self, board: &Board, left: usize, top: usize) {
        for y in 0..board.height() {
            for x in 0..board.width() {
                let kind = board.top_kind_at(x, y);
                let on_target = board.has_kind_at(EntityKind::WinArea, x, y);
                let (chars, mut fg, bg) = glyph(kind, on_target);

                // Entities still sliding into this cell are drawn brighter.
                let moving = board.top_entity_at(x, y)
                    .map(|id| board.entity(id))
                    .and_then(|e| e.transit)
                    .map_or(false, |t| t.progress() < 1.0);
                if moving {
                    fg = Color::White;
                }

                let col = left + x * CELL_W;
                self.front.set(col, top + y, Cell::new(chars[0], fg, bg));
                self.front.set(col + 1, top + y, Cell::new(chars[1], fg, bg));
            }
        }

        // Faint trail on the cell a sliding entity just left.
        for e in board.entities() {
            let t = match e.transit {
                Some(t) if t.progress() < 0.5 => t,
                _ => continue,
            };
            let (dx, dy) = t.dir.offset();
            let (fx, fy) = (e.x as i32 - dx, e.y as i32 - dy);
            if fx < 0 || fy < 0 { continue; }
            let (fx, fy) = (fx as usize, fy as usize);
            if !board.in_bounds(fx, fy) { continue; }
            let occupied = board.top_kind_at(fx, fy).map_or(false, EntityKind::can_be_moved);
            if occupied { continue; }
            let col = left + fx * CELL_W;
            self.front.set(col, top + fy, Cell::new('·', DIM, FLOOR_BG));
            self.front.set(col + 1, top + fy, Cell::new('·', DIM, FLOOR_BG));
        }
    }

    fn compose_name_entry(&mut self, w: &WorldState) {
        let box_w = 34;
        let left = self.front.width.saturating_sub(box_w) / 2;
        let top = self.front.height.saturating_sub(7) / 2;
        let bg = Color::Rgb { r: 20, g: 20, b: 60 };

        for row in top..top + 7 {
            for x in left..left + box_w {
                self.front.set(x, row, Cell::new(' ', Color::White, bg));
            }
        }
        let elapsed = w.session.as_ref().and_then(GameSession::elapsed_on_win).unwrap_or(0.0);
        self.front.put_centered(top + 1, "NEW HIGHSCORE!", GOLD, bg);
        self.front.put_centered(top + 2, &format!("{elapsed:.1} seconds"), Color::White, bg);
        let cursor = if (w.anim_tick / 5) % 2 == 0 { '_' } else { ' ' };
        let field = format!("Name: {:<20}", format!("{}{}", w.name_input, cursor));
        self.front.put_centered(top + 4, &field, HI, bg);
        self.front.put_centered(top + 5, "ENTER: Save   ESC: Skip", DIM, bg);
        if !w.message.is_empty() {
            self.front.put_centered(top + 8, &w.message, TARGET_FG, Color::Reset);
        }
    }

    fn compose_highscores(&mut self, w: &WorldState) {
        self.front.put_centered(1, "╔══════════════════════════════╗", GOLD, Color::Reset);
        self.front.put_centered(2, "║         HIGHSCORES           ║", GOLD, Color::Reset);
        self.front.put_centered(3, "╚══════════════════════════════╝", GOLD, Color::Reset);

        let map = match &w.hs_map {
            Some(m) => m,
            None => {
                self.front.put_centered(6, "No highscores yet.", DIM, Color::Reset);
                self.front.put_centered(8, "ESC: Back", DIM, Color::Reset);
                return;
            }
        };
        self.front.put_centered(5, &map.name, Color::White, Color::Reset);

        let scores = w.highscores.query(map).unwrap_or(&[]);
        for (i, score) in scores.iter().enumerate() {
            let rank = i + 1;
            let line = format!("{:>2}. {:<20} {:>7.1}s", rank, score.player, score.time);
            let (fg, bg) = if w.last_rank == Some(rank) { (HI, CURSOR_BG) } else { (Color::White, Color::Reset) };
            self.front.put_centered(7 + i, &line, fg, bg);
        }

        let foot = 8 + scores.len().max(1);
        self.front.put_centered(foot, "←→: Other maps   ESC: Back", DIM, Color::Reset);
    }
}

/// Line under the board: the start prompt, the pending message, or the outcome.
fn status_line(s: &GameSession, message: &str) -> String {
    match s.state() {
        SessionState::NotStarted => "Press ENTER to start".to_string(),
        SessionState::Ended(Outcome::Won { elapsed }) if message.is_empty() => {
            format!("Solved in {elapsed:.1}s!")
        }
        SessionState::Ended(Outcome::Lost) if message.is_empty() => "Time's up!".to_string(),
        _ => message.to_string(),
    }
}

fn help_line(s: &GameSession) -> String {
    if !s.started() {
        "ENTER: Start   R: Restart   ESC: Levels".to_string()
    } else if s.is_ended() {
        "R: Retry   ESC: Levels   H: Highscores".to_string()
    } else {
        "←↑↓→/WASD: Move   R: Restart   ESC: Levels".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::TimingConfig;
    use crate::sim::level::parse_map;

    #[test]
    fn glyphs_distinguish_box_on_target() {
        let (c, fg_on, _) = glyph(Some(EntityKind::Box), true);
        let (c2, fg_off, _) = glyph(Some(EntityKind::Box), false);
        assert_eq!(c, c2);
        assert_ne!(fg_on, fg_off);
        assert_eq!(glyph(None, false).0, [' ', ' ']);
    }

    #[test]
    fn frame_buffer_clips_writes() {
        let mut fb = FrameBuffer::new(4, 1);
        fb.put_str(2, 0, "abcd", Color::White, Color::Reset);
        assert_eq!(fb.get(3, 0).ch, 'b');
        assert_eq!(fb.get(4, 0), Cell::BLANK);
        fb.put_centered(0, "xy", Color::White, Color::Reset);
        assert_eq!(fb.get(1, 0).ch, 'x');
        assert_eq!(fb.get(1, 0).bg, Cell::BASE_BG);
    }

    #[test]
    fn status_prompts_for_enter_until_started() {
        let timing = TimingConfig { move_time_ms: 0, ..TimingConfig::default() };
        let mut s = GameSession::new(parse_map("timeLimit=9\nmap=\n#pbX#\n").unwrap(), &timing);
        assert_eq!(status_line(&s, ""), "Press ENTER to start");
        assert!(help_line(&s).starts_with("ENTER: Start"));

        s.begin();
        assert_eq!(status_line(&s, "Go!"), "Go!");
        assert!(help_line(&s).contains("Move"));

        s.tick(Duration::from_secs(9));
        assert_eq!(status_line(&s, ""), "Time's up!");
        assert!(help_line(&s).starts_with("R: Retry"));
    }
}
