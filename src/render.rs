use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use pocket_critters::{Mood, PetSession, Registry};
use std::io::{self, Write};
use std::time::Instant;

const BG: Color = Color::Black;
const FG: Color = Color::White;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: FG,
            bg: BG,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg: BG });
    }
}

fn bar(value01: f64, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f64 + 0.5) as usize;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

/// `#rrggbb` to a terminal color; anything else is white.
pub(crate) fn hex_color(hex: &str, enabled: bool) -> Color {
    let parse = || -> Option<Color> {
        let h = hex.strip_prefix('#')?;
        if h.len() != 6 {
            return None;
        }
        let n = u32::from_str_radix(h, 16).ok()?;
        Some(Color::Rgb {
            r: (n >> 16) as u8,
            g: (n >> 8) as u8,
            b: n as u8,
        })
    };
    if enabled {
        parse().unwrap_or(FG)
    } else {
        FG
    }
}

fn tint(c: Color, enabled: bool) -> Color {
    if enabled {
        c
    } else {
        FG
    }
}

fn sprite(species_id: &str, eyes: char, mouth: &str) -> Vec<String> {
    let e = eyes;
    match species_id {
        "dog" => vec![
            "  __     __  ".to_string(),
            " /  \\___/  \\ ".to_string(),
            format!(" \\_/ {e}   {e} \\_/"),
            "   |   ^   |  ".to_string(),
            format!("   |  {mouth}  |  "),
            "    \\_____/   ".to_string(),
            "    /|   |\\   ".to_string(),
        ],
        "cat" => vec![
            "   /\\_/\\    ".to_string(),
            format!("  ( {e}   {e} ) "),
            "   >  ^  <  ".to_string(),
            format!("  (  {mouth}  ) "),
            "   (_____)  ".to_string(),
            "    U   U   ".to_string(),
        ],
        "capybara" => vec![
            "     _________    ".to_string(),
            format!("   _/ {e}         \\__"),
            "  (  ^           __)".to_string(),
            format!("   \\ {mouth} ________/ "),
            "    ||        ||   ".to_string(),
        ],
        _ => vec![format!("( {e} {mouth} {e} )")],
    }
}

fn mouth_for(mood: Mood) -> &'static str {
    match mood {
        Mood::Happy => "\\_/",
        Mood::Neutral => "---",
        Mood::Worried => "~~~",
        Mood::Sad => "/^\\",
    }
}

pub(crate) fn mood_face(mood: Mood) -> &'static str {
    match mood {
        Mood::Happy => "(^_^)",
        Mood::Neutral => "(-_-)",
        Mood::Worried => "(o_o;)",
        Mood::Sad => "(T_T)",
    }
}

pub(crate) fn draw_pet_ascii(
    buf: &mut CellBuffer,
    species_id: &str,
    mood: Mood,
    animation: Option<&str>,
    fg: Color,
    cx: i32,
    cy: i32,
) {
    let (eyes, mouth) = match animation {
        Some("pet-eating") => ('o', "(O)"),
        Some("pet-sleeping") => ('-', "zzz"),
        Some("pet-playing") => ('^', "\\o/"),
        _ if mood == Mood::Sad => ('T', mouth_for(mood)),
        _ => ('o', mouth_for(mood)),
    };
    let grid = sprite(species_id, eyes, mouth);

    let h = grid.len() as i32;
    let w = grid.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
    let x0 = cx - w / 2;
    let y0 = cy - h / 2;

    for (yy, line) in grid.iter().enumerate() {
        let y = y0 + yy as i32;
        if y < 0 || y >= buf.h as i32 {
            continue;
        }
        for (xx, ch) in line.chars().enumerate() {
            let x = x0 + xx as i32;
            if ch != ' ' && x >= 0 && x < buf.w as i32 {
                buf.set(x as u16, y as u16, Cell { ch, fg, bg: BG });
            }
        }
    }
}

pub(crate) fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let w = buf.w;
    let h = buf.h;

    let bw = 60.min(w.saturating_sub(4));
    let bh = 16.min(h.saturating_sub(4));
    if bw < 4 || bh < 4 {
        return;
    }

    let x0 = (w - bw) / 2;
    let y0 = (h - bh) / 2;

    let border = |ch| Cell { ch, fg: FG, bg: BG };
    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            buf.set(x, y, Cell::default());
        }
    }
    for x in x0..x0 + bw {
        buf.set(x, y0, border('─'));
        buf.set(x, y0 + bh - 1, border('─'));
    }
    for y in y0..y0 + bh {
        buf.set(x0, y, border('│'));
        buf.set(x0 + bw - 1, y, border('│'));
    }
    buf.set(x0, y0, border('┌'));
    buf.set(x0 + bw - 1, y0, border('┐'));
    buf.set(x0, y0 + bh - 1, border('└'));
    buf.set(x0 + bw - 1, y0 + bh - 1, border('┘'));

    draw_text(buf, x0 + 2, y0 + 1, title, FG);

    let mut yy = y0 + 3;
    for line in body.lines() {
        if yy >= y0 + bh - 1 {
            break;
        }
        draw_text(buf, x0 + 2, yy, line, FG);
        yy += 1;
    }
}

pub(crate) fn draw_selection(buf: &mut CellBuffer, registry: &Registry, cursor: usize) {
    draw_text(buf, 1, 0, "Pocket Critters  |  Choose your pet", FG);
    for (i, sp) in registry.species_list().iter().enumerate() {
        let selected = i == cursor;
        let line = format!("{} {}", if selected { ">" } else { " " }, sp.name);
        draw_text(
            buf,
            2,
            2 + i as u16,
            &line,
            if selected { Color::Yellow } else { FG },
        );
    }
    if let Some(sp) = registry.species_list().get(cursor) {
        let cx = buf.w as i32 * 2 / 3;
        let cy = buf.h as i32 / 2;
        draw_pet_ascii(buf, &sp.id, Mood::Happy, None, FG, cx, cy);
    }
    draw_text(
        buf,
        1,
        buf.h.saturating_sub(1),
        "↑↓ choose | enter select | q quit",
        FG,
    );
}

pub(crate) struct NamingView<'a> {
    pub(crate) species_id: &'a str,
    pub(crate) color_id: &'a str,
    pub(crate) name_edit: &'a str,
    pub(crate) max_name_len: usize,
    pub(crate) notice: Option<&'a str>,
    pub(crate) color: bool,
}

pub(crate) fn draw_naming(buf: &mut CellBuffer, registry: &Registry, v: &NamingView) {
    let Some(sp) = registry.species(v.species_id) else {
        return;
    };
    draw_text(buf, 1, 0, &format!("Name your {}", sp.name), FG);

    let pet_color = sp.color(v.color_id);
    let color_name = pet_color.map(|c| c.name.as_str()).unwrap_or("?");
    let fg = pet_color
        .map(|c| hex_color(&c.primary, v.color))
        .unwrap_or(FG);
    draw_text(buf, 2, 2, &format!("Color: ◀ {color_name} ▶"), fg);

    let mut preview = v.name_edit.to_string();
    if preview.chars().count() < v.max_name_len {
        preview.push('_');
    }
    draw_text(buf, 2, 4, &format!("Name:  {preview}"), FG);
    if let Some(notice) = v.notice {
        draw_text(buf, 2, 6, notice, tint(Color::Red, v.color));
    }

    let cx = buf.w as i32 * 2 / 3;
    let cy = buf.h as i32 / 2;
    draw_pet_ascii(buf, &sp.id, Mood::Happy, None, fg, cx, cy);

    draw_text(
        buf,
        1,
        buf.h.saturating_sub(1),
        "type a name | ←→ color | enter adopt | esc back",
        FG,
    );
}

pub(crate) struct PetView<'a> {
    pub(crate) animation: Option<(&'a str, &'a str)>,
    pub(crate) toasts: &'a [String],
    pub(crate) bounce: i32,
    pub(crate) color: bool,
    pub(crate) now: Instant,
}

pub(crate) fn draw_pet_screen(buf: &mut CellBuffer, session: &PetSession, v: &PetView) {
    let Some(id) = session.identity() else {
        return;
    };
    let registry = session.registry();
    let species_name = registry
        .species(&id.species_id)
        .map(|s| s.name.as_str())
        .unwrap_or("critter");
    let mood = session.mood();

    let title = format!(
        "Pocket Critters  |  {} the {}  |  {}",
        id.name,
        species_name,
        mood_face(mood)
    );
    draw_text(buf, 1, 0, &title, FG);

    let worried = session.thresholds().worried;
    for (i, def) in registry.stats().iter().enumerate() {
        let value = session.stats().get_value(&def.id);
        let span = (def.max - def.min).max(f64::EPSILON);
        let b = bar((value - def.min) / span, 14);
        let line = format!("{:<10} {b} {:>5.1}", def.name, value);
        let fg = if value <= worried {
            tint(Color::Red, v.color)
        } else {
            FG
        };
        draw_text(buf, 1, 2 + i as u16, &line, fg);
    }

    let mut y = 3 + registry.stats().len() as u16;
    if session.is_hungry() {
        draw_text(buf, 1, y, &format!("{} is hungry!", id.name), tint(Color::Red, v.color));
    }
    y += 2;

    for (i, action) in registry.actions().iter().enumerate() {
        let ready = session.can_perform(&action.id);
        let wait = session.actions().cooldown_remaining(&action.id, v.now);
        let suffix = if wait.is_zero() {
            String::new()
        } else {
            format!(" ({:.0}s)", wait.as_secs_f32().ceil())
        };
        let line = format!("{} {}{suffix}", i + 1, action.name);
        let fg = if ready { FG } else { Color::DarkGrey };
        draw_text(buf, 1, y + i as u16, &line, tint(fg, v.color));
    }

    let fg = registry
        .color(&id.species_id, &id.color_id)
        .map(|c| hex_color(&c.primary, v.color))
        .unwrap_or(FG);
    let panel_w = 34.min(buf.w as i32 / 2);
    let cx = panel_w + (buf.w as i32 - panel_w) / 2;
    let cy = buf.h as i32 / 2 + v.bounce;
    draw_pet_ascii(buf, &id.species_id, mood, v.animation.map(|a| a.0), fg, cx, cy);

    let status_y = buf.h.saturating_sub(3);
    if let Some((animation, particle)) = v.animation {
        let verb = match animation {
            "pet-eating" => "is eating",
            "pet-playing" => "is playing with",
            "pet-sleeping" => "is napping",
            _ => "enjoys",
        };
        draw_text(buf, 1, status_y, &format!("{} {verb} {particle}", id.name), FG);
    }

    for (i, toast) in v.toasts.iter().rev().take(3).enumerate() {
        let ty = status_y.saturating_sub(1 + i as u16);
        draw_text(buf, 1, ty, toast, tint(Color::Yellow, v.color));
    }

    draw_text(
        buf,
        1,
        buf.h.saturating_sub(1),
        "1-9/f act | r rename | X change pet | h help | q quit",
        FG,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse() {
        assert_eq!(
            hex_color("#deb887", true),
            Color::Rgb {
                r: 0xde,
                g: 0xb8,
                b: 0x87
            }
        );
        assert_eq!(hex_color("tan", true), FG);
        assert_eq!(hex_color("#deb887", false), FG);
    }

    #[test]
    fn bar_rounds_to_cells() {
        assert_eq!(bar(0.5, 4), "[██  ]");
        assert_eq!(bar(2.0, 2), "[██]");
    }

    #[test]
    fn sprites_draw_inside_small_buffers() {
        let mut buf = CellBuffer::new(8, 4);
        for sp in ["dog", "cat", "capybara", "unknown"] {
            draw_pet_ascii(&mut buf, sp, Mood::Sad, Some("pet-eating"), FG, 4, 2);
        }
        draw_center_box(&mut buf, "tiny", "body");
    }
}
