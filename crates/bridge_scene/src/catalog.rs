//! Geometry node socket catalog
//!
//! Declared input and output sockets for the host node types the scene knows
//! how to instantiate. Socket order matters: connections address sockets by
//! index as well as by name.

struct NodeSpec {
    node_type: &'static str,
    inputs: &'static [&'static str],
    outputs: &'static [&'static str],
}

const fn entry(
    node_type: &'static str,
    inputs: &'static [&'static str],
    outputs: &'static [&'static str],
) -> NodeSpec {
    NodeSpec {
        node_type,
        inputs,
        outputs,
    }
}

const GEO: &[&str] = &["Geometry"];
const MESH: &[&str] = &["Mesh"];
const CURVE: &[&str] = &["Curve"];
const INSTANCES: &[&str] = &["Instances"];
const VALUE: &[&str] = &["Value"];
const VECTOR: &[&str] = &["Vector"];
const NONE: &[&str] = &[];

const CATALOG: &[NodeSpec] = &[
    // Group interface
    entry("NodeGroupInput", NONE, GEO),
    entry("NodeGroupOutput", GEO, NONE),
    // Mesh primitives
    entry("GeometryNodeMeshCube", &["Size", "Vertices X", "Vertices Y", "Vertices Z"], &["Mesh", "UV Map"]),
    entry("GeometryNodeMeshCylinder", &["Vertices", "Side Segments", "Fill Segments", "Radius", "Depth"], &["Mesh", "Top", "Side", "Bottom", "UV Map"]),
    entry("GeometryNodeMeshCone", &["Vertices", "Side Segments", "Fill Segments", "Radius Top", "Radius Bottom", "Depth"], &["Mesh", "Top", "Bottom", "Side", "UV Map"]),
    entry("GeometryNodeMeshUVSphere", &["Segments", "Rings", "Radius"], &["Mesh", "UV Map"]),
    entry("GeometryNodeMeshIcoSphere", &["Radius", "Subdivisions"], &["Mesh", "UV Map"]),
    entry("GeometryNodeMeshGrid", &["Size X", "Size Y", "Vertices X", "Vertices Y"], &["Mesh", "UV Map"]),
    entry("GeometryNodeMeshCircle", &["Vertices", "Radius"], MESH),
    entry("GeometryNodeMeshLine", &["Count", "Start Location", "Offset"], MESH),
    // Curve primitives
    entry("GeometryNodeCurvePrimitiveLine", &["Start", "End"], CURVE),
    entry("GeometryNodeCurvePrimitiveCircle", &["Resolution", "Radius"], CURVE),
    entry("GeometryNodeCurveStar", &["Points", "Inner Radius", "Outer Radius", "Twist"], &["Curve", "Outer Points"]),
    entry("GeometryNodeCurveSpiral", &["Resolution", "Rotations", "Start Radius", "End Radius", "Height", "Reverse"], CURVE),
    entry("GeometryNodeCurvePrimitiveQuadrilateral", &["Width", "Height"], CURVE),
    entry("GeometryNodeCurvePrimitiveBezierSegment", &["Resolution", "Start", "Start Handle", "End Handle", "End"], CURVE),
    // Geometry operations
    entry("GeometryNodeTransform", &["Geometry", "Translation", "Rotation", "Scale"], GEO),
    entry("GeometryNodeJoinGeometry", GEO, GEO),
    entry("GeometryNodeSetPosition", &["Geometry", "Selection", "Position", "Offset"], GEO),
    entry("GeometryNodeSetShadeSmooth", &["Geometry", "Selection", "Shade Smooth"], GEO),
    entry("GeometryNodeSubdivideMesh", &["Mesh", "Level"], MESH),
    entry("GeometryNodeSubdivisionSurface", &["Mesh", "Level", "Edge Crease", "Vertex Crease"], MESH),
    entry("GeometryNodeExtrudeMesh", &["Mesh", "Selection", "Offset", "Offset Scale", "Individual"], &["Mesh", "Top", "Side"]),
    entry("GeometryNodeBevel", &["Mesh", "Selection", "Amount"], MESH),
    entry("GeometryNodeTriangulate", &["Mesh", "Selection", "Minimum Vertices"], MESH),
    entry("GeometryNodeFlipFaces", &["Mesh", "Selection"], MESH),
    entry("GeometryNodeMergeByDistance", &["Geometry", "Selection", "Distance"], GEO),
    entry("GeometryNodeMeshBoolean", &["Mesh 1", "Mesh 2", "Self Intersection", "Hole Tolerant"], &["Mesh", "Intersecting Edges"]),
    entry("GeometryNodeConvexHull", GEO, &["Convex Hull"]),
    entry("GeometryNodeDuplicateElements", &["Geometry", "Selection", "Amount"], &["Geometry", "Duplicate Index"]),
    entry("GeometryNodeDeleteGeometry", &["Geometry", "Selection"], GEO),
    entry("GeometryNodeSeparateGeometry", &["Geometry", "Selection"], &["Selection", "Inverted"]),
    // Curve operations
    entry("GeometryNodeCurveToMesh", &["Curve", "Profile Curve", "Fill Caps"], MESH),
    entry("GeometryNodeCurveToPoints", &["Curve", "Count", "Length"], &["Points", "Tangent", "Normal", "Rotation"]),
    entry("GeometryNodeMeshToCurve", &["Mesh", "Selection"], CURVE),
    entry("GeometryNodeFillCurve", CURVE, MESH),
    entry("GeometryNodeFilletCurve", &["Curve", "Count", "Radius", "Limit Radius"], CURVE),
    entry("GeometryNodeResampleCurve", &["Curve", "Selection", "Count", "Length"], CURVE),
    entry("GeometryNodeReverseCurve", &["Curve", "Selection"], CURVE),
    entry("GeometryNodeTrimCurve", &["Curve", "Selection", "Start", "End"], CURVE),
    entry("GeometryNodeCurveSplineType", &["Curve", "Selection"], CURVE),
    // Instances
    entry("GeometryNodeInstanceOnPoints", &["Points", "Selection", "Instance", "Pick Instance", "Instance Index", "Rotation", "Scale"], INSTANCES),
    entry("GeometryNodeRealizeInstances", GEO, GEO),
    entry("GeometryNodeRotateInstances", &["Instances", "Selection", "Rotation", "Pivot Point", "Local Space"], INSTANCES),
    entry("GeometryNodeScaleInstances", &["Instances", "Selection", "Scale", "Center", "Local Space"], INSTANCES),
    entry("GeometryNodeTranslateInstances", &["Instances", "Selection", "Translation", "Local Space"], INSTANCES),
    // Input
    entry("GeometryNodeInputPosition", NONE, &["Position"]),
    entry("GeometryNodeInputNormal", NONE, &["Normal"]),
    entry("GeometryNodeInputIndex", NONE, &["Index"]),
    entry("GeometryNodeInputID", NONE, &["ID"]),
    entry("GeometryNodeObjectInfo", &["Object", "As Instance"], &["Transform", "Location", "Rotation", "Scale", "Geometry"]),
    entry("GeometryNodeCollectionInfo", &["Collection", "Separate Children", "Reset Children"], INSTANCES),
    entry("ShaderNodeValue", NONE, VALUE),
    entry("FunctionNodeInputVector", NONE, VECTOR),
    entry("FunctionNodeInputInt", NONE, &["Integer"]),
    entry("FunctionNodeInputBool", NONE, &["Boolean"]),
    entry("FunctionNodeInputColor", NONE, &["Color"]),
    // Math
    entry("ShaderNodeMath", &["Value", "Value_001", "Value_002"], VALUE),
    entry("ShaderNodeVectorMath", &["Vector", "Vector_001", "Vector_002", "Scale"], &["Vector", "Value"]),
    entry("FunctionNodeCompare", &["A", "B"], &["Result"]),
    entry("ShaderNodeClamp", &["Value", "Min", "Max"], &["Result"]),
    entry("ShaderNodeMapRange", &["Value", "From Min", "From Max", "To Min", "To Max"], &["Result"]),
    entry("ShaderNodeMix", &["Factor", "A", "B"], &["Result"]),
    entry("FunctionNodeFloatToInt", &["Float"], &["Integer"]),
    entry("ShaderNodeTexNoise", &["Vector", "Scale", "Detail", "Roughness", "Distortion"], &["Fac", "Color"]),
    entry("ShaderNodeTexVoronoi", &["Vector", "Scale", "Randomness"], &["Distance", "Color", "Position"]),
    entry("ShaderNodeTexGradient", VECTOR, &["Color", "Fac"]),
    entry("ShaderNodeTexWave", &["Vector", "Scale", "Distortion", "Detail"], &["Color", "Fac"]),
    entry("ShaderNodeTexMusgrave", &["Vector", "Scale", "Detail", "Dimension", "Lacunarity"], &["Fac"]),
    // Utilities
    entry("GeometryNodeSwitch", &["Switch", "False", "True"], &["Output"]),
    entry("FunctionNodeRandomValue", &["Min", "Max", "ID", "Seed"], VALUE),
    entry("ShaderNodeCombineXYZ", &["X", "Y", "Z"], VECTOR),
    entry("ShaderNodeSeparateXYZ", VECTOR, &["X", "Y", "Z"]),
    entry("FunctionNodeAlignRotationToVector", &["Rotation", "Factor", "Vector"], &["Rotation"]),
    entry("FunctionNodeRotateVector", &["Vector", "Rotation"], VECTOR),
    // Attributes
    entry("GeometryNodeStoreNamedAttribute", &["Geometry", "Selection", "Name", "Value"], GEO),
    entry("GeometryNodeInputNamedAttribute", &["Name"], &["Attribute", "Exists"]),
    entry("GeometryNodeCaptureAttribute", &["Geometry", "Value"], &["Geometry", "Attribute"]),
    // Material
    entry("GeometryNodeSetMaterial", &["Geometry", "Selection", "Material"], GEO),
    entry("GeometryNodeInputMaterialIndex", NONE, &["Material Index"]),
    entry("GeometryNodeSetMaterialIndex", &["Geometry", "Selection", "Material Index"], GEO),
];

/// Declared `(inputs, outputs)` for a host node type, or `None` when the
/// host has no such type.
pub fn sockets_for(node_type: &str) -> Option<(&'static [&'static str], &'static [&'static str])> {
    CATALOG
        .iter()
        .find(|entry| entry.node_type == node_type)
        .map(|entry| (entry.inputs, entry.outputs))
}

pub fn is_known(node_type: &str) -> bool {
    sockets_for(node_type).is_some()
}
