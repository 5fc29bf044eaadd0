// ============ GC Header ============

// ============ GC Constants (from Lua 5.5 lgc.h) ============
// Object ages for generational GC
// Uses 3 bits (0-7) - stored in bits 0-2 of marked field
pub const G_NEW: u8 = 0; // Created in current cycle
pub const G_SURVIVAL: u8 = 1; // Created in previous cycle (survived one minor)
pub const G_OLD0: u8 = 2; // Marked old by forward barrier in this cycle
pub const G_OLD1: u8 = 3; // First full cycle as old
pub const G_OLD: u8 = 4; // Really old object (not to be visited in minor)
pub const G_TOUCHED1: u8 = 5; // Old object touched this cycle
pub const G_TOUCHED2: u8 = 6; // Old object touched in previous cycle

// Color bit positions in marked field
pub const WHITE0BIT: u8 = 3; // Object is white (type 0)
pub const WHITE1BIT: u8 = 4; // Object is white (type 1)
pub const BLACKBIT: u8 = 5; // Object is black
pub const FINALIZEDBIT: u8 = 6; // Object has been marked for finalization

// Bit masks
pub const WHITEBITS: u8 = (1 << WHITE0BIT) | (1 << WHITE1BIT);
pub const AGEBITS: u8 = 0x07; // Mask for age bits (bits 0-2: 0b00000111)
pub const MASKCOLORS: u8 = (1 << BLACKBIT) | WHITEBITS;
pub const MASKGCBITS: u8 = MASKCOLORS | AGEBITS;

/// GC object header - embedded in every GC-managed object
/// Port of Lua 5.5's CommonHeader (lgc.h)
///
/// Bit layout of `marked` field:
/// - Bits 0-2: Age (G_NEW=0, G_SURVIVAL=1, G_OLD0=2, G_OLD1=3, G_OLD=4, G_TOUCHED1=5, G_TOUCHED2=6)
/// - Bit 3: WHITE0 (white type 0)
/// - Bit 4: WHITE1 (white type 1)  
/// - Bit 5: BLACK (fully marked)
/// - Bit 6: FINALIZEDBIT (marked for finalization)
/// - Bit 7: Reserved for future use
///
/// **Tri-color invariant**: Gray is implicit - an object is gray iff it has no white bits AND no black bit.
/// This allows gray detection without an explicit gray bit: `!is_white() && !is_black()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct GcHeader {
    pub marked: u8, // Color and age bits combined
    pub size: u32,  // Size of the object in bytes (for memory tracking)
}

impl Default for GcHeader {
    fn default() -> Self {
        // WARNING: Default creates a GRAY object (no color bits set)
        // This is INCORRECT for new objects - they should be WHITE
        // Use GcHeader::with_white(current_white) instead when creating GC objects
        // Port of lgc.c: New objects MUST be created with luaC_white(g)
        GcHeader {
            marked: G_NEW, // Age 0, no color bits set (gray state - WRONG for new objects!)
            size: 0,
        }
    }
}

impl GcHeader {
    /// Create a new header with given white bit and age G_NEW
    /// Port of lgc.c: luaC_white(g) which returns (currentwhite & WHITEBITS)
    /// combined with makewhite(g,x) which sets white color for new objects
    ///
    /// **CRITICAL**: All new GC objects MUST use this constructor with current_white from GC
    /// Using Default::default() creates incorrect GRAY objects that may be prematurely collected
    #[inline(always)]
    pub fn with_white(current_white: u8, size: u32) -> Self {
        debug_assert!(
            current_white == 0 || current_white == 1,
            "current_white must be 0 or 1"
        );
        GcHeader {
            marked: (1 << (WHITE0BIT + current_white)) | G_NEW,
            size,
        }
    }

    // ============ Age Operations (generational GC) ============

    /// Get object age (bits 0-2)
    /// Port of lgc.h: getage(o) returns (o->marked & AGEBITS)
    #[inline(always)]
    pub fn age(&self) -> u8 {
        self.marked & AGEBITS
    }

    /// Set object age (preserves color bits)
    /// Port of lgc.h: setage(o,a) sets age while preserving other bits
    #[inline(always)]
    pub fn set_age(&mut self, age: u8) {
        debug_assert!(age <= G_TOUCHED2, "Invalid age value");
        self.marked = (self.marked & !AGEBITS) | (age & AGEBITS);
    }

    /// Check if object is old (age > G_SURVIVAL)
    /// Port of lgc.h: isold(o) macro
    #[inline(always)]
    pub fn is_old(&self) -> bool {
        self.age() > G_SURVIVAL
    }

    // ============ Color Operations (tri-color marking) ============

    /// Check if object is white (either WHITE0 or WHITE1)
    /// Port of lgc.h: iswhite(x) macro
    #[inline(always)]
    pub fn is_white(&self) -> bool {
        (self.marked & WHITEBITS) != 0
    }

    /// Check if object is black
    /// Port of lgc.h: isblack(x) macro
    #[inline(always)]
    pub fn is_black(&self) -> bool {
        (self.marked & (1 << BLACKBIT)) != 0
    }

    /// Check if object is gray (neither white nor black)
    /// Port of lgc.h: isgray(x) macro
    /// Gray objects are in gray lists waiting to be scanned
    #[inline(always)]
    pub fn is_gray(&self) -> bool {
        (self.marked & (WHITEBITS | (1 << BLACKBIT))) == 0
    }

    // ============ Special Flags ============

    /// Check if object is marked for finalization
    /// Port of lgc.h: tofinalize(x) macro
    #[inline(always)]
    pub fn to_finalize(&self) -> bool {
        (self.marked & (1 << FINALIZEDBIT)) != 0
    }

    /// Mark object for finalization
    #[inline(always)]
    pub fn set_finalized(&mut self) {
        self.marked |= 1 << FINALIZEDBIT;
    }

    /// Clear finalization mark
    #[inline(always)]
    pub fn clear_finalized(&mut self) {
        self.marked &= !(1 << FINALIZEDBIT);
    }

    /// Check if object is fixed (never collected)
    /// In Lua 5.5, fixed objects also use FINALIZEDBIT (bit 6) but never sweep them
    /// Port of lgc.h: isold(x) but for permanent objects
    #[inline(always)]
    pub fn is_fixed(&self) -> bool {
        // In Lua 5.5, fixed strings and permanent objects have special age G_OLD
        // and are never collected. We can use same bit as finalized since
        // fixed objects won't be finalized.
        self.age() == G_OLD && self.to_finalize()
    }

    /// Mark object as fixed (never collected)
    /// Port of lgc.h: luaC_fix()
    #[inline(always)]
    pub fn set_fixed(&mut self) {
        self.set_age(G_OLD);
        self.set_finalized();
    }

    // ============ Color Transitions ============

    /// Make object white with given current_white (0 or 1)
    /// Port of lgc.c: makewhite(g,x) macro
    /// Sets object to current white color, preserving age
    #[inline(always)]
    pub fn make_white(&mut self, current_white: u8) {
        debug_assert!(
            current_white == 0 || current_white == 1,
            "current_white must be 0 or 1"
        );
        let old_marked = self.marked;
        // Clear all color bits, then set the appropriate white bit
        self.marked = (self.marked & !MASKCOLORS) | (1 << (WHITE0BIT + current_white));

        // Debug logging for specific objects
        if old_marked & (1 << BLACKBIT) != 0 {
            // Object was black before, log the change
            // We'll add object ID logging at call site
        }
    }

    /// Make object gray (clear all color bits, keep age)
    /// Port of lgc.c: set2gray(x) macro
    /// Gray objects are in gray lists waiting to be scanned
    #[inline(always)]
    pub fn make_gray(&mut self) {
        self.marked &= !MASKCOLORS; // Clear color bits, preserve age
    }

    /// Make object black (from any color)
    /// Port of lgc.c: set2black(x) macro
    /// Black objects are fully marked (object and all references scanned)
    #[inline(always)]
    pub fn make_black(&mut self) {
        self.marked = (self.marked & !WHITEBITS) | (1 << BLACKBIT);
    }

    /// Make object black from non-white state (assertion version)
    /// Port of lgc.c: nw2black(x) macro
    #[inline(always)]
    pub fn nw2black(&mut self) {
        debug_assert!(!self.is_white(), "nw2black called on white object");
        self.marked |= 1 << BLACKBIT;
    }

    // ============ Death Detection ============

    /// Check if object is dead (has the "other" white bit set)
    /// Port of lgc.h: isdead(g,v) and isdeadm(ow,m) macros
    /// During sweep, objects with "other white" are garbage
    #[inline(always)]
    pub fn is_dead(&self, other_white: u8) -> bool {
        debug_assert!(
            other_white == 0 || other_white == 1,
            "other_white must be 0 or 1"
        );
        (self.marked & (1 << (WHITE0BIT + other_white))) != 0
    }

    /// Get the "other white" bit from current white
    /// Port of lgc.h: otherwhite(g) macro returns (currentwhite ^ WHITEBITS)
    #[inline(always)]
    pub fn otherwhite(current_white: u8) -> u8 {
        current_white ^ 1
    }

    /// Change white type (flip between WHITE0 and WHITE1)
    /// Port of lgc.h: changewhite(x) macro
    #[inline(always)]
    pub fn change_white(&mut self) {
        self.marked ^= WHITEBITS;
    }

    // ============ Generational GC Age Transitions ============

    /// Advance object to OLD0 (marked old by forward barrier)
    #[inline(always)]
    pub fn make_old0(&mut self) {
        self.set_age(G_OLD0);
    }

    /// Advance object to OLD1 (first full cycle as old)
    #[inline(always)]
    pub fn make_old1(&mut self) {
        self.set_age(G_OLD1);
    }

    /// Advance object to fully OLD (won't be visited in minor collections)
    #[inline(always)]
    pub fn make_old(&mut self) {
        self.set_age(G_OLD);
    }

    /// Mark object as TOUCHED1 (old object modified in this cycle)
    #[inline(always)]
    pub fn make_touched1(&mut self) {
        self.set_age(G_TOUCHED1);
    }

    /// Mark object as TOUCHED2 (old object modified in previous cycle)
    #[inline(always)]
    pub fn make_touched2(&mut self) {
        self.set_age(G_TOUCHED2);
    }

    /// Make object SURVIVAL (survived one minor collection)
    #[inline(always)]
    pub fn make_survival(&mut self) {
        self.set_age(G_SURVIVAL);
    }

    // ============ Utility Methods ============

    /// Check if object is marked (not white)
    /// Convenience method for readability
    #[inline(always)]
    pub fn is_marked(&self) -> bool {
        !self.is_white()
    }

    /// Legacy method for backward compatibility
    #[deprecated(note = "Use make_black/make_white directly for clarity")]
    #[inline(always)]
    pub fn set_marked(&mut self, marked: bool) {
        if marked {
            self.make_black();
        } else {
            self.make_white(0);
        }
    }
}
