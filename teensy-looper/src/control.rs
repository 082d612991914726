/// Analog input routed to the codec's ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputSource {
    LineIn,
    Mic,
}

/// Control surface of an audio codec chip.
///
/// Register sequencing and clock bring-up are the implementor's business;
/// the engine calls [`enable`](Self::enable) once during bring-up and assumes
/// the codec is clocked before the DMA transport starts.
pub trait AudioControl {
    /// Error type for control operations.
    type Error;

    /// Enable the audio component.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Disable the audio component.
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Set the output volume (0.0 = silent, 1.0 = full scale).
    fn volume(&mut self, level: f32) -> Result<(), Self::Error>;

    /// Select which analog input feeds the ADC.
    fn input_select(&mut self, input: InputSource) -> Result<(), Self::Error>;
}
