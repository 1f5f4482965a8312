/// Generates program-unique names for renamed declarations.
///
/// A generated name is the source name, a `.`, and a counter shared by every
/// name the generator hands out. `.` never appears in a C identifier, so a
/// generated name cannot collide with a source name or with another
/// generated name.
#[derive(Debug, Default)]
pub struct NameGen {
    next: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, source: &str) -> String {
        let name = format!("{}.{}", source, self.next);
        self.next += 1;
        name
    }

    pub fn issued(&self) -> u32 {
        self.next
    }
}
