use thiserror::Error;

use crate::keymap::KeyPress;

/// Failure reported by a key injector. Opaque to the pipeline.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InjectError(pub String);

/// Synthesizes one key-down/key-up pair on the host, holding the modifier
/// for the duration of the tap.
pub trait KeyInjector {
    fn tap(&mut self, press: &KeyPress) -> Result<(), InjectError>;
}

/// Writes each tap to stdout instead of touching the keyboard.
#[derive(Debug, Default)]
pub struct PrintInjector {
    pub track: Option<usize>,
}

impl PrintInjector {
    fn line(&self, press: &KeyPress) -> String {
        match self.track {
            Some(track) => format!("[{}] {}", track, press),
            None => press.to_string(),
        }
    }
}

impl KeyInjector for PrintInjector {
    fn tap(&mut self, press: &KeyPress) -> Result<(), InjectError> {
        println!("{}", self.line(press));
        Ok(())
    }
}

#[cfg(feature = "inject")]
pub use self::host::EnigoInjector;

#[cfg(feature = "inject")]
mod host {
    use enigo::{Direction, Enigo, Key, Keyboard, Settings};

    use super::{InjectError, KeyInjector};
    use crate::keymap::{KeyPress, Modifier};

    /// Taps keys on the host through `enigo`.
    pub struct EnigoInjector {
        enigo: Enigo,
    }

    impl EnigoInjector {
        pub fn new() -> Result<Self, InjectError> {
            let enigo =
                Enigo::new(&Settings::default()).map_err(|e| InjectError(e.to_string()))?;
            Ok(Self { enigo })
        }
    }

    fn modifier_key(modifier: Modifier) -> Key {
        match modifier {
            Modifier::Shift => Key::Shift,
            Modifier::Control => Key::Control,
        }
    }

    impl KeyInjector for EnigoInjector {
        fn tap(&mut self, press: &KeyPress) -> Result<(), InjectError> {
            let err = |e: enigo::InputError| InjectError(e.to_string());
            if let Some(m) = press.modifier {
                self.enigo
                    .key(modifier_key(m), Direction::Press)
                    .map_err(err)?;
            }
            let result = self.enigo.key(Key::Unicode(press.key), Direction::Click);
            if let Some(m) = press.modifier {
                self.enigo
                    .key(modifier_key(m), Direction::Release)
                    .map_err(err)?;
            }
            result.map_err(err)
        }
    }
}
