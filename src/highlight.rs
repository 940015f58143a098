//! Pulsierende Hervorhebung des ausgewählten Objekts.
//!
//! Solange ein Objekt ausgewählt ist, schwingt seine Farbe sinusförmig
//! zwischen der Originalfarbe und Weiß. Die Animation läuft im selben
//! Frame-Takt wie das Picking und endet, sobald das `highlighted`-Flag des
//! Eintrags fällt.

use crate::color::{self, Color};
use crate::scene::Scene;
use crate::selection::SelectionMachine;

/// Sinus-Animator für die Auswahlfarbe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightAnimator {
    /// Kreisfrequenz in rad/s.
    rate: f64,
}

impl HighlightAnimator {
    pub const DEFAULT_RATE: f64 = 5.0;

    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Intensität `(sin(t·k) + 1) / 2` im Bereich 0.0 bis 1.0.
    ///
    /// # Parameter
    /// * `t` - Zeit in Sekunden seit Sitzungsbeginn
    #[inline]
    pub fn intensity(&self, t: f64) -> f64 {
        ((t * self.rate).sin() + 1.0) / 2.0
    }

    /// Farbe zum Zeitpunkt `t` für eine gegebene Originalfarbe.
    pub fn pulse_color(&self, original: u32, t: f64) -> u32 {
        Color::from_hex(original)
            .lerp(&Color::from_hex(color::WHITE), self.intensity(t))
            .to_hex()
    }

    /// Führt einen Animationsschritt aus.
    ///
    /// # Rückgabewert
    /// `true`, solange die Animation aktiv ist (ein Eintrag ist ausgewählt und
    /// noch hervorgehoben), sonst `false`
    pub fn step(&self, scene: &mut Scene, selection: &SelectionMachine, t: f64) -> bool {
        let Some(item_id) = selection.selected() else {
            return false;
        };
        match scene.entry_mut(item_id) {
            Some(entry) if entry.highlighted => {
                entry.mesh.color = self.pulse_color(entry.original_color, t);
                true
            }
            _ => false,
        }
    }
}

impl Default for HighlightAnimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATE)
    }
}
